use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::user::db::{problem as user_problem, UserDbExt};
use crate::data::user::{RoleUpdate, TeacherAssignment, User};
use crate::resp::auth::StaffToken;
use crate::resp::problem::Problem;

/// Every profile except admins
#[utoipa::path(
    responses(
        (status = 200, description = "Students and teachers", body = Vec<User>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/users")]
#[tracing::instrument]
pub async fn user_list(auth: StaffToken, db: &State<Database>) -> Result<Json<Vec<User>>, Problem> {
    auth.require_admin()?;
    Ok(Json(db.non_admin_users().await?))
}

#[get("/admin/users/<id>")]
#[tracing::instrument]
pub async fn user_get(
    id: Uuid,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<User>, Problem> {
    db.get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| user_problem::not_found(id))
}

#[utoipa::path(
    params(("id", description = "User ID")),
    request_body = RoleUpdate,
    responses((status = 200, body = User)),
    security(("jwt" = []))
)]
#[put("/admin/users/<id>/role", format = "application/json", data = "<update>")]
#[tracing::instrument]
pub async fn user_set_role(
    id: Uuid,
    update: Json<RoleUpdate>,
    auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<User>, Problem> {
    auth.require_admin()?;
    Ok(Json(db.set_role(id, update.role).await?))
}

#[put("/admin/users/<id>/teacher", format = "application/json", data = "<assignment>")]
#[tracing::instrument]
pub async fn user_assign_teacher(
    id: Uuid,
    assignment: Json<TeacherAssignment>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<User>, Problem> {
    Ok(Json(db.assign_teacher(id, assignment.teacher_id).await?))
}

/// Students, optionally only those assigned to one teacher
#[get("/admin/students?<teacher>")]
#[tracing::instrument]
pub async fn student_list(
    teacher: Option<Uuid>,
    _auth: StaffToken,
    db: &State<Database>,
) -> Result<Json<Vec<User>>, Problem> {
    Ok(Json(db.students(teacher).await?))
}

#[cfg(test)]
mod tests {
    use crate::role::Role;
    use crate::testing::{bearer, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::Value;

    #[rocket::async_test]
    async fn user_list_requires_token() {
        let client = test_client().await;
        let response = client.get("/api/v1/admin/users").dispatch().await;

        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );
        let body: Value = response.into_json().await.expect("problem body");
        assert_eq!(body["status"], 401);
        assert_eq!(body["detail"], "No access token.");
    }

    #[rocket::async_test]
    async fn user_list_rejects_students_and_teachers() {
        let client = test_client().await;

        let response = client
            .get("/api/v1/admin/users")
            .header(bearer(Role::Student))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .get("/api/v1/admin/users")
            .header(bearer(Role::Teacher))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn garbage_token_is_unauthorized() {
        let client = test_client().await;
        let response = client
            .get("/api/v1/admin/students")
            .header(rocket::http::Header::new("Authorization", "Bearer not.a.jwt"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
