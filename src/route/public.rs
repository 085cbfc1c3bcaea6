use chrono::{DateTime, Duration, Utc};
use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use rocket::http::Status;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::data::availability::AvailabilityDbExt;
use crate::data::class::db::ClassDbExt;
use crate::data::content::setting::{PricePlan, SettingDbExt};
use crate::locale::Catalogs;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::schedule::{Interval, SlotRules};

/// Longest range open slots can be asked for at once.
pub const MAX_SLOT_RANGE_DAYS: i64 = 62;
const DEFAULT_SLOT_RANGE_DAYS: i64 = 14;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

#[utoipa::path(responses((status = 200, description = "Service is up", body = Health)))]
#[get("/health")]
pub fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Plans shown on the pricing page
#[utoipa::path(responses((status = 200, body = Vec<PricePlan>)))]
#[get("/pricing")]
#[tracing::instrument]
pub async fn pricing(db: &State<Database>) -> Result<Json<Vec<PricePlan>>, Problem> {
    Ok(Json(db.price_plans().await?))
}

/// Message catalog for a supported locale
#[utoipa::path(
    params(("locale", description = "Locale code, e.g. `en`")),
    responses(
        (status = 200, description = "Messages keyed by id"),
        (status = 404, description = "Unsupported locale", body = Problem),
    )
)]
#[get("/i18n/<locale>")]
#[tracing::instrument]
pub fn messages(
    locale: &str,
    catalogs: &State<Catalogs>,
) -> Result<Json<Map<String, Value>>, Problem> {
    catalogs.catalog(locale).map(Json).ok_or_else(|| {
        Problem::new_untyped(Status::NotFound, "Unsupported locale.")
            .insert_str("locale", locale)
            .to_owned()
    })
}

fn parse_instant(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, Problem> {
    value
        .map(|it| {
            DateTime::parse_from_rfc3339(it)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|_| bad_field(field, "Expected an RFC 3339 timestamp."))
        })
        .transpose()
}

/// Resolves the requested slot range, defaulting to the next two weeks.
pub fn slot_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Interval, Problem> {
    let start = parse_instant("from", from)?.unwrap_or(now);
    let end = parse_instant("to", to)?.unwrap_or(start + Duration::days(DEFAULT_SLOT_RANGE_DAYS));

    if end <= start {
        return Err(bad_field("to", "Range end must be after its start."));
    }
    if end - start > Duration::days(MAX_SLOT_RANGE_DAYS) {
        return Err(bad_field(
            "to",
            format!("Range can't exceed {} days.", MAX_SLOT_RANGE_DAYS),
        ));
    }
    Ok(Interval::new(start, end))
}

/// Bookable lesson slots
#[utoipa::path(
    params(
        ("from" = Option<String>, Query, description = "RFC 3339 range start, default now"),
        ("to" = Option<String>, Query, description = "RFC 3339 range end, default two weeks later"),
        ("duration" = Option<u32>, Query, description = "Lesson length in minutes"),
    ),
    responses(
        (status = 200, body = Vec<Interval>),
        (status = 400, description = "Invalid range", body = Problem),
    )
)]
#[get("/availability/slots?<from>&<to>&<duration>")]
#[tracing::instrument]
pub async fn open_slots(
    from: Option<&str>,
    to: Option<&str>,
    duration: Option<u32>,
    db: &State<Database>,
    rules: &State<SlotRules>,
) -> Result<Json<Vec<Interval>>, Problem> {
    let now = Utc::now();
    let range = slot_range(from, to, now)?;
    let lesson = match duration {
        Some(0) => return Err(bad_field("duration", "Duration must be positive.")),
        Some(minutes) if minutes > 8 * 60 => {
            return Err(bad_field("duration", "Duration can't exceed 480 minutes."))
        }
        Some(minutes) => Duration::minutes(minutes as i64),
        None => rules.default_lesson,
    };

    let availability = db.availability().await?;
    let blocked = db.blocked_between(&range).await?;
    let classes = db.active_classes_between(&range).await?;

    Ok(Json(rules.open_slots(
        &availability,
        &blocked,
        &classes,
        &range,
        lesson,
        now,
    )))
}
