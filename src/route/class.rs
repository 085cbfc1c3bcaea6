use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::class::db::{ClassDbExt, ClassQuery};
use crate::data::class::{Class, ClassData, ClassStatus};
use crate::data::RecordDbExt;
use crate::middleware::paging::PageState;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[utoipa::path(
    params(
        ("status" = Option<ClassStatus>, Query, description = "Only classes in this state"),
        ("student" = Option<Uuid>, Query, description = "Only classes of this student"),
    ),
    responses((status = 200, body = Vec<Class>)),
    security(("jwt" = []))
)]
#[get("/admin/classes?<status>&<student>")]
#[tracing::instrument]
pub async fn class_list(
    status: Option<ClassStatus>,
    student: Option<Uuid>,
    page: PageState,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<Class>>, Problem> {
    let query = ClassQuery { status, student };
    Ok(Json(db.classes(query, page).await?))
}

#[get("/admin/classes/<id>")]
#[tracing::instrument]
pub async fn class_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    db.get::<Class>(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::not_found("Class", id))
}

/// Book a class directly
///
/// Active classes may not overlap unless `allow_overlap` is set.
#[utoipa::path(
    request_body = ClassData,
    responses(
        (status = 201, body = Class),
        (status = 400, description = "Invalid class data", body = Problem),
        (status = 409, description = "Overlaps another active class", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/classes", format = "application/json", data = "<class>")]
#[tracing::instrument]
pub async fn class_create(
    class: Json<ClassData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<(Status, Json<Class>), Problem> {
    let class = db.create_class(class.into_inner()).await?;
    Ok((Status::Created, Json(class)))
}

#[put("/admin/classes/<id>", format = "application/json", data = "<class>")]
#[tracing::instrument]
pub async fn class_update(
    id: Uuid,
    class: Json<ClassData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    Ok(Json(db.update_class(id, class.into_inner()).await?))
}

#[delete("/admin/classes/<id>")]
#[tracing::instrument]
pub async fn class_delete(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Status, Problem> {
    match db.remove::<Class>(id).await? {
        true => {
            tracing::info!("Deleted class {}", id);
            Ok(Status::NoContent)
        }
        false => Err(problems::not_found("Class", id)),
    }
}
