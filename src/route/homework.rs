use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::homework::db::{HomeworkDbExt, HomeworkQuery};
use crate::data::homework::{Homework, HomeworkData, HomeworkReview, HomeworkStatus};
use crate::data::RecordDbExt;
use crate::middleware::paging::PageState;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[utoipa::path(
    params(
        ("status" = Option<HomeworkStatus>, Query, description = "Only homework in this state"),
        ("student" = Option<Uuid>, Query, description = "Only homework of this student"),
    ),
    responses((status = 200, body = Vec<Homework>)),
    security(("jwt" = []))
)]
#[get("/admin/homework?<status>&<student>")]
#[tracing::instrument]
pub async fn homework_list(
    status: Option<HomeworkStatus>,
    student: Option<Uuid>,
    page: PageState,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<Homework>>, Problem> {
    let query = HomeworkQuery { status, student };
    Ok(Json(db.homework(query, page).await?))
}

#[get("/admin/homework/<id>")]
#[tracing::instrument]
pub async fn homework_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Homework>, Problem> {
    db.get::<Homework>(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::not_found("Homework", id))
}

#[utoipa::path(
    request_body = HomeworkData,
    responses(
        (status = 201, body = Homework),
        (status = 400, description = "Missing title", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/homework", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn homework_create(
    data: Json<HomeworkData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<(Status, Json<Homework>), Problem> {
    let homework = db.create_homework(data.into_inner()).await?;
    Ok((Status::Created, Json(homework)))
}

#[put("/admin/homework/<id>", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn homework_update(
    id: Uuid,
    data: Json<HomeworkData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Homework>, Problem> {
    Ok(Json(db.update_homework(id, data.into_inner()).await?))
}

/// Grade a submission and leave feedback
#[post("/admin/homework/<id>/review", format = "application/json", data = "<review>")]
#[tracing::instrument]
pub async fn homework_review(
    id: Uuid,
    review: Json<HomeworkReview>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Homework>, Problem> {
    Ok(Json(db.review_homework(id, review.into_inner()).await?))
}

#[delete("/admin/homework/<id>")]
#[tracing::instrument]
pub async fn homework_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<Homework>(id).await? {
        true => Ok(Status::NoContent),
        false => Err(problems::not_found("Homework", id)),
    }
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn untitled_homework_is_rejected() {
        let client = test_client().await;
        let response = client
            .post("/api/v1/admin/homework")
            .header(ContentType::JSON)
            .header(bearer(Role::Teacher))
            .body(
                json!({
                    "student_id": uuid::Uuid::new_v4(),
                    "title": " ",
                    "due_date": "2030-03-04T10:00:00Z",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
