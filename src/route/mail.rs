use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::mail::{Email, Mailer};
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::util::is_valid_email;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestEmailRequest {
    pub to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestEmailResponse {
    pub success: bool,
}

/// Sends a test message through the mail provider
#[utoipa::path(
    request_body = TestEmailRequest,
    responses(
        (status = 200, body = TestEmailResponse),
        (status = 400, description = "Malformed recipient", body = Problem),
        (status = 500, description = "Provider error", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/test-email", format = "application/json", data = "<request>")]
#[tracing::instrument(skip(mailer))]
pub async fn test_email(
    request: Json<TestEmailRequest>,
    auth: StaffToken,
    mailer: &State<Mailer>,
) -> Result<Json<TestEmailResponse>, Problem> {
    auth.require_admin()?;
    let to = request.to.trim();
    if !is_valid_email(to) {
        return Err(bad_field("to", "Not a valid e-mail address."));
    }

    mailer
        .send(&Email::new(
            to,
            "Test e-mail",
            "If you can read this, outgoing mail works.",
        ))
        .await?;
    Ok(Json(TestEmailResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn malformed_recipient_is_rejected() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/admin/test-email")
            .header(ContentType::JSON)
            .header(bearer(Role::Admin))
            .body(json!({ "to": "nobody" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn unconfigured_provider_is_a_server_error() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/admin/test-email")
            .header(ContentType::JSON)
            .header(bearer(Role::Admin))
            .body(json!({ "to": "ana@example.com" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::InternalServerError);
    }

    #[rocket::async_test]
    async fn teachers_cannot_send_test_mail() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/admin/test-email")
            .header(ContentType::JSON)
            .header(bearer(Role::Teacher))
            .body(json!({ "to": "ana@example.com" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
