use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::class::Class;
use crate::data::class_request::db::ClassRequestDbExt;
use crate::data::class_request::{
    ApproveRequest, ClassRequest, ClassRequestData, Proposal, RejectRequest, RequestStatus,
};
use crate::data::RecordDbExt;
use crate::resp::auth::StaffToken;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovedRequest {
    pub request: ClassRequest,
    pub classes: Vec<Class>,
}

#[utoipa::path(
    params(("status" = Option<RequestStatus>, Query, description = "Only requests in this state")),
    responses((status = 200, body = Vec<ClassRequest>)),
    security(("jwt" = []))
)]
#[get("/admin/class-requests?<status>")]
#[tracing::instrument]
pub async fn request_list(
    status: Option<RequestStatus>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<ClassRequest>>, Problem> {
    Ok(Json(db.class_requests(status).await?))
}

#[get("/admin/class-requests/<id>")]
#[tracing::instrument]
pub async fn request_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ClassRequest>, Problem> {
    db.get::<ClassRequest>(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::not_found("Class request", id))
}

#[put("/admin/class-requests/<id>", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn request_update(
    id: Uuid,
    data: Json<ClassRequestData>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ClassRequest>, Problem> {
    Ok(Json(db.update_class_request(id, data.into_inner()).await?))
}

/// Turn a request into booked classes
///
/// One class is created for every slot the student asked for, or for the
/// teacher's accepted proposal.
#[utoipa::path(
    params(("id", description = "Class request ID")),
    request_body = ApproveRequest,
    responses(
        (status = 200, body = ApprovedRequest),
        (status = 404, description = "No such request", body = Problem),
        (status = 409, description = "A slot overlaps a booked class", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/class-requests/<id>/approve", format = "application/json", data = "<options>")]
#[tracing::instrument]
pub async fn request_approve(
    id: Uuid,
    options: Json<ApproveRequest>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ApprovedRequest>, Problem> {
    let (request, classes) = db.approve(id, options.into_inner()).await?;
    Ok(Json(ApprovedRequest { request, classes }))
}

#[post("/admin/class-requests/<id>/reject", format = "application/json", data = "<body>")]
#[tracing::instrument]
pub async fn request_reject(
    id: Uuid,
    body: Json<RejectRequest>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ClassRequest>, Problem> {
    Ok(Json(db.reject(id, body.into_inner().note).await?))
}

/// Suggest other slots; the student accepts them from their dashboard
#[post("/admin/class-requests/<id>/propose", format = "application/json", data = "<proposal>")]
#[tracing::instrument]
pub async fn request_propose(
    id: Uuid,
    proposal: Json<Proposal>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<ClassRequest>, Problem> {
    Ok(Json(db.propose(id, proposal.into_inner()).await?))
}
