use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::payment::db::PaymentDbExt;
use crate::data::payment::{NotificationStatus, PaymentDecision, PaymentNotification};
use crate::data::RecordDbExt;
use crate::middleware::paging::PageState;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[utoipa::path(
    params(("status" = Option<NotificationStatus>, Query, description = "Only notifications in this state")),
    responses((status = 200, body = Vec<PaymentNotification>)),
    security(("jwt" = []))
)]
#[get("/admin/payments?<status>")]
#[tracing::instrument]
pub async fn payment_list(
    status: Option<NotificationStatus>,
    page: PageState,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<PaymentNotification>>, Problem> {
    Ok(Json(db.payments(status, page).await?))
}

#[get("/admin/payments/<id>")]
#[tracing::instrument]
pub async fn payment_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<PaymentNotification>, Problem> {
    db.get::<PaymentNotification>(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::not_found("Payment notification", id))
}

/// Confirm a reported payment
///
/// The linked class is marked paid and, when it was waiting for payment, scheduled.
#[utoipa::path(
    params(("id", description = "Payment notification ID")),
    request_body = PaymentDecision,
    responses(
        (status = 200, body = PaymentNotification),
        (status = 404, description = "No such notification", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/payments/<id>/confirm", format = "application/json", data = "<decision>")]
#[tracing::instrument]
pub async fn payment_confirm(
    id: Uuid,
    decision: Json<PaymentDecision>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<PaymentNotification>, Problem> {
    Ok(Json(
        db.confirm_payment(id, decision.into_inner().note).await?,
    ))
}

#[post("/admin/payments/<id>/reject", format = "application/json", data = "<decision>")]
#[tracing::instrument]
pub async fn payment_reject(
    id: Uuid,
    decision: Json<PaymentDecision>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<PaymentNotification>, Problem> {
    Ok(Json(
        db.reject_payment(id, decision.into_inner().note).await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};

    #[rocket::async_test]
    async fn students_cannot_confirm_payments() {
        let client = test_client().await;
        let response = client
            .post(format!(
                "/api/v1/admin/payments/{}/confirm",
                uuid::Uuid::new_v4()
            ))
            .header(ContentType::JSON)
            .header(bearer(Role::Student))
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
