use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::Value;
use utoipa::ToSchema;

use crate::data::content::setting::{Setting, SettingDbExt};
use crate::resp::auth::StaffToken;
use crate::resp::problem::Problem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingValue {
    #[schema(value_type = Object)]
    pub value: Value,
}

fn missing_setting(key: &str) -> Problem {
    Problem::new_untyped(Status::NotFound, "Setting doesn't exist.")
        .insert_str("key", key)
        .to_owned()
}

#[get("/admin/settings")]
#[tracing::instrument]
pub async fn settings_list(
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<Setting>>, Problem> {
    Ok(Json(db.all_settings().await?))
}

#[get("/admin/settings/<key>")]
#[tracing::instrument]
pub async fn setting_get(
    key: &str,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Setting>, Problem> {
    db.setting(key)
        .await?
        .map(Json)
        .ok_or_else(|| missing_setting(key))
}

/// Store a setting value
///
/// Values under `pricing` must be a list of price plans.
#[utoipa::path(
    params(("key", description = "Setting key")),
    request_body = SettingValue,
    responses(
        (status = 200, body = Setting),
        (status = 403, description = "Only admins change settings", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/admin/settings/<key>", format = "application/json", data = "<value>")]
#[tracing::instrument]
pub async fn setting_put(
    key: &str,
    value: Json<SettingValue>,
    auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Setting>, Problem> {
    auth.require_admin()?;
    Ok(Json(db.put_setting(key, value.into_inner().value).await?))
}

#[delete("/admin/settings/<key>")]
#[tracing::instrument]
pub async fn setting_delete(
    key: &str,
    auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    auth.require_admin()?;
    match db.remove_setting(key).await? {
        true => Ok(Status::NoContent),
        false => Err(missing_setting(key)),
    }
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn teachers_cannot_change_settings() {
        let client = test_client().await;
        let response = client
            .put("/api/v1/admin/settings/pricing")
            .header(ContentType::JSON)
            .header(bearer(Role::Teacher))
            .body(json!({ "value": [] }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn pricing_with_bad_currency_is_rejected() {
        let client = test_client().await;
        let response = client
            .put("/api/v1/admin/settings/pricing")
            .header(ContentType::JSON)
            .header(bearer(Role::Admin))
            .body(
                json!({ "value": [{ "name": "Single lesson", "price": 3000, "currency": "euro" }] })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
