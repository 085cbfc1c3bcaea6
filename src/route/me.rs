//! Self-service endpoints for any signed-in user, mostly used by students.

use chrono::Utc;
use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::dashboard::StudentSummary;
use crate::data::class::db::ClassDbExt;
use crate::data::class::Class;
use crate::data::class_request::db::ClassRequestDbExt;
use crate::data::class_request::{ClassRequest, NewClassRequest};
use crate::data::homework::db::HomeworkDbExt;
use crate::data::homework::{Homework, HomeworkSubmission};
use crate::data::payment::db::PaymentDbExt;
use crate::data::payment::{NewPaymentNotification, PaymentNotification};
use crate::data::user::db::UserDbExt;
use crate::data::user::{ProfileUpdate, User};
use crate::data::RecordDbExt;
use crate::mail::{Email, Mailer};
use crate::resp::auth::AuthToken;
use crate::resp::problem::Problem;

/// Own profile
///
/// Created from the token claims on first access.
#[utoipa::path(
    responses(
        (status = 200, body = User),
        (status = 401, description = "Missing or invalid token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/me")]
#[tracing::instrument]
pub async fn me_get(auth: AuthToken, db: &State<Database>) -> Result<Json<User>, Problem> {
    Ok(Json(db.profile_for(&auth).await?))
}

#[utoipa::path(
    request_body = ProfileUpdate,
    responses((status = 200, body = User)),
    security(("jwt" = []))
)]
#[put("/me", format = "application/json", data = "<update>")]
#[tracing::instrument]
pub async fn me_update(
    update: Json<ProfileUpdate>,
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<User>, Problem> {
    let mut user = db.profile_for(&auth).await?;
    user.apply(update.into_inner());
    db.replace(&user).await?;
    Ok(Json(user))
}

#[utoipa::path(
    responses((status = 200, body = StudentSummary)),
    security(("jwt" = []))
)]
#[get("/me/dashboard")]
#[tracing::instrument]
pub async fn me_dashboard(
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<StudentSummary>, Problem> {
    let classes = db.classes_of_student(auth.user).await?;
    let homework = db.homework_of_student(auth.user).await?;
    let payments = db.payments_of_student(auth.user).await?;
    let requests = db.class_requests_of_student(auth.user).await?;

    Ok(Json(StudentSummary::derive(
        classes,
        &homework,
        &payments,
        &requests,
        Utc::now(),
    )))
}

#[get("/me/classes")]
#[tracing::instrument]
pub async fn me_classes(auth: AuthToken, db: &State<Database>) -> Result<Json<Vec<Class>>, Problem> {
    Ok(Json(db.classes_of_student(auth.user).await?))
}

#[get("/me/homework")]
#[tracing::instrument]
pub async fn me_homework(
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<Vec<Homework>>, Problem> {
    Ok(Json(db.homework_of_student(auth.user).await?))
}

#[get("/me/payments")]
#[tracing::instrument]
pub async fn me_payments(
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<Vec<PaymentNotification>>, Problem> {
    Ok(Json(db.payments_of_student(auth.user).await?))
}

#[get("/me/class-requests")]
#[tracing::instrument]
pub async fn me_class_requests(
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<Vec<ClassRequest>>, Problem> {
    Ok(Json(db.class_requests_of_student(auth.user).await?))
}

#[post("/me/homework/<id>/submit", format = "application/json", data = "<submission>")]
#[tracing::instrument]
pub async fn me_submit_homework(
    id: Uuid,
    submission: Json<HomeworkSubmission>,
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<Homework>, Problem> {
    Ok(Json(
        db.submit_homework(auth.user, id, submission.into_inner())
            .await?,
    ))
}

/// Report a payment made outside the site
#[utoipa::path(
    request_body = NewPaymentNotification,
    responses(
        (status = 201, body = PaymentNotification),
        (status = 400, description = "Invalid amount, currency or class", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/me/payments", format = "application/json", data = "<payment>")]
#[tracing::instrument(skip(mailer))]
pub async fn me_notify_payment(
    payment: Json<NewPaymentNotification>,
    auth: AuthToken,
    db: &State<Database>,
    mailer: &State<Mailer>,
) -> Result<(Status, Json<PaymentNotification>), Problem> {
    let notification = db.notify_payment(auth.user, payment.into_inner()).await?;

    if let Some(notify) = mailer.notify_address() {
        let email = Email::new(
            notify,
            "New payment notification",
            format!(
                "Student {} reported a payment of {} {} (minor units).",
                auth.email.as_deref().unwrap_or("without e-mail"),
                notification.amount,
                notification.currency
            ),
        );
        mailer.send_best_effort(email).await;
    }

    Ok((Status::Created, Json(notification)))
}

/// Ask for one or more lesson slots
#[utoipa::path(
    request_body = NewClassRequest,
    responses(
        (status = 201, body = ClassRequest),
        (status = 400, description = "No slots, past slots or overlapping slots", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/me/class-requests", format = "application/json", data = "<request>")]
#[tracing::instrument(skip(mailer))]
pub async fn me_request_classes(
    request: Json<NewClassRequest>,
    auth: AuthToken,
    db: &State<Database>,
    mailer: &State<Mailer>,
) -> Result<(Status, Json<ClassRequest>), Problem> {
    let request = db
        .create_class_request(auth.user, request.into_inner())
        .await?;

    if let Some(notify) = mailer.notify_address() {
        let email = Email::new(
            notify,
            "New class request",
            format!(
                "{} asked for {} slot(s).",
                auth.email.as_deref().unwrap_or("A student"),
                request.requested_slots.len()
            ),
        );
        mailer.send_best_effort(email).await;
    }

    Ok((Status::Created, Json(request)))
}

#[delete("/me/class-requests/<id>")]
#[tracing::instrument]
pub async fn me_withdraw_request(
    id: Uuid,
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    db.withdraw(auth.user, id).await?;
    Ok(Status::NoContent)
}

/// Take the teacher's proposed slots instead of the requested ones
#[post("/me/class-requests/<id>/accept")]
#[tracing::instrument]
pub async fn me_accept_proposal(
    id: Uuid,
    auth: AuthToken,
    db: &State<Database>,
) -> Result<Json<ClassRequest>, Problem> {
    Ok(Json(db.accept_proposal(auth.user, id).await?))
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn profile_requires_token() {
        let client = test_client().await;
        let response = client.get("/api/v1/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn past_slots_cannot_be_requested() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/me/class-requests")
            .header(ContentType::JSON)
            .header(bearer(Role::Student))
            .body(
                json!({
                    "requested_slots": [
                        { "starts_at": "2001-01-01T10:00:00Z", "duration_minutes": 60 }
                    ],
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn empty_submission_is_rejected() {
        let client = test_client().await;
        let response = client
            .post(format!(
                "/api/v1/me/homework/{}/submit",
                uuid::Uuid::new_v4()
            ))
            .header(ContentType::JSON)
            .header(bearer(Role::Student))
            .body(json!({ "text": "  " }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn non_positive_payment_is_rejected() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/me/payments")
            .header(ContentType::JSON)
            .header(bearer(Role::Student))
            .body(json!({ "amount": 0, "currency": "EUR" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
