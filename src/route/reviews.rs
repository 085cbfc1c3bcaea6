use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::content::review::{NewReview, Review, ReviewApproval, ReviewDbExt};
use crate::data::RecordDbExt;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

/// Approved reviews
#[utoipa::path(
    params(("locale" = Option<String>, Query, description = "Only reviews in this locale")),
    responses((status = 200, body = Vec<Review>))
)]
#[get("/reviews?<locale>")]
#[tracing::instrument]
pub async fn review_list(
    locale: Option<&str>,
    db: &State<Database>,
) -> Result<Json<Vec<Review>>, Problem> {
    Ok(Json(db.approved_reviews(locale).await?))
}

/// Submit a review; it's shown once staff approve it
#[utoipa::path(
    request_body = NewReview,
    responses(
        (status = 201, body = Review),
        (status = 400, description = "Invalid rating or empty text", body = Problem),
    )
)]
#[post("/reviews", format = "application/json", data = "<review>")]
#[tracing::instrument]
pub async fn review_submit(
    review: Json<NewReview>,
    db: &State<Database>,
) -> Result<(Status, Json<Review>), Problem> {
    let review = review.into_inner();
    review.validate()?;
    let review = review.into_review();
    db.insert(&review).await?;
    tracing::info!("Received review {} ({} stars)", review.id, review.rating);
    Ok((Status::Created, Json(review)))
}

#[get("/admin/reviews")]
#[tracing::instrument]
pub async fn admin_review_list(
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<Review>>, Problem> {
    Ok(Json(db.all_reviews().await?))
}

#[put("/admin/reviews/<id>/approval", format = "application/json", data = "<approval>")]
#[tracing::instrument]
pub async fn admin_review_approve(
    id: Uuid,
    approval: Json<ReviewApproval>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Review>, Problem> {
    Ok(Json(db.set_approved(id, approval.approved).await?))
}

#[delete("/admin/reviews/<id>")]
#[tracing::instrument]
pub async fn admin_review_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<Review>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Review", id)),
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::test_client;
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn out_of_range_rating_is_rejected() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/reviews")
            .header(ContentType::JSON)
            .body(json!({ "author_name": "Luis", "rating": 9, "text": "Great" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn review_moderation_requires_token() {
        let client = test_client().await;
        let response = client.get("/api/v1/admin/reviews").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
