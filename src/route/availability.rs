use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::availability::{AvailabilityDbExt, AvailabilitySlot, BlockedPeriod};
use crate::data::RecordDbExt;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[utoipa::path(
    responses((status = 200, description = "Weekly teaching windows", body = Vec<AvailabilitySlot>)),
    security(("jwt" = []))
)]
#[get("/admin/availability")]
#[tracing::instrument]
pub async fn availability_list(
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<AvailabilitySlot>>, Problem> {
    Ok(Json(db.availability().await?))
}

#[post("/admin/availability", format = "application/json", data = "<slot>")]
#[tracing::instrument]
pub async fn availability_create(
    slot: Json<AvailabilitySlot>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<(Status, Json<AvailabilitySlot>), Problem> {
    let mut slot = slot.into_inner();
    slot.validate()?;
    slot.id = Uuid::new_v4();
    db.insert(&slot).await?;
    Ok((Status::Created, Json(slot)))
}

#[put("/admin/availability/<id>", format = "application/json", data = "<slot>")]
#[tracing::instrument]
pub async fn availability_update(
    id: Uuid,
    slot: Json<AvailabilitySlot>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<AvailabilitySlot>, Problem> {
    let mut slot = slot.into_inner();
    slot.validate()?;
    slot.id = id;
    match db.replace(&slot).await? {
        true => Ok(Json(slot)),
        false => Err(problems::not_found("Availability slot", id)),
    }
}

#[delete("/admin/availability/<id>")]
#[tracing::instrument]
pub async fn availability_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<AvailabilitySlot>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Availability slot", id)),
    }
}

#[get("/admin/blocked")]
#[tracing::instrument]
pub async fn blocked_list(
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<BlockedPeriod>>, Problem> {
    Ok(Json(db.blocked_periods().await?))
}

/// Block a period (holidays, sick days) from booking
#[utoipa::path(
    request_body = BlockedPeriod,
    responses(
        (status = 201, body = BlockedPeriod),
        (status = 400, description = "Period ends before it starts", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/blocked", format = "application/json", data = "<period>")]
#[tracing::instrument]
pub async fn blocked_create(
    period: Json<BlockedPeriod>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<(Status, Json<BlockedPeriod>), Problem> {
    let mut period = period.into_inner();
    period.validate()?;
    period.id = Uuid::new_v4();
    db.insert(&period).await?;
    tracing::info!(
        "Blocked {} to {}",
        period.starts_at.to_rfc3339(),
        period.ends_at.to_rfc3339()
    );
    Ok((Status::Created, Json(period)))
}

#[put("/admin/blocked/<id>", format = "application/json", data = "<period>")]
#[tracing::instrument]
pub async fn blocked_update(
    id: Uuid,
    period: Json<BlockedPeriod>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<BlockedPeriod>, Problem> {
    let mut period = period.into_inner();
    period.validate()?;
    period.id = id;
    match db.replace(&period).await? {
        true => Ok(Json(period)),
        false => Err(problems::not_found("Blocked period", id)),
    }
}

#[delete("/admin/blocked/<id>")]
#[tracing::instrument]
pub async fn blocked_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<BlockedPeriod>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Blocked period", id)),
    }
}
