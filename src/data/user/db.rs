use bson::doc;
use chrono::Utc;
use mongodb::Database;
use uuid::Uuid;

use super::User;
use crate::data::{filter, RecordDbExt};
use crate::resp::auth::AuthToken;
use crate::resp::problem::Problem;
use crate::role::Role;

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.")
            .insert_str("id", id)
            .clone()
    }

    #[inline]
    pub fn not_a_teacher(id: Uuid) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Assigned user isn't a teacher.")
            .insert_str("teacher_id", id)
            .clone()
    }
}

pub trait UserDbExt {
    /// Loads the caller's profile, creating it from token claims on first access.
    async fn profile_for(&self, auth: &AuthToken) -> Result<User, Problem>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem>;

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem>;

    /// Every profile without the admin role.
    async fn non_admin_users(&self) -> Result<Vec<User>, Problem>;

    async fn students(&self, teacher: Option<Uuid>) -> Result<Vec<User>, Problem>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<User, Problem>;

    async fn assign_teacher(&self, id: Uuid, teacher: Option<Uuid>) -> Result<User, Problem>;
}

impl UserDbExt for Database {
    async fn profile_for(&self, auth: &AuthToken) -> Result<User, Problem> {
        if let Some(mut existing) = self.get_user(auth.user).await? {
            // Role promotions made by the auth provider take effect on next access.
            if auth.role > existing.role {
                existing.role = auth.role;
                existing.updated_at = Utc::now();
                self.replace(&existing).await?;
            }
            return Ok(existing);
        }

        let user = User::from_token(auth);
        self.upsert(&user).await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.get::<User>(id).await
    }

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, Problem> {
        self.find_one_by::<User>(filter::by_email(crate::util::normalize_email(
            email.as_ref(),
        )))
        .await
    }

    async fn non_admin_users(&self) -> Result<Vec<User>, Problem> {
        self.list::<User>(
            doc! { "role": { "$ne": Role::Admin.to_string() } },
            Some(doc! { "created_at": -1 }),
            None,
        )
        .await
    }

    async fn students(&self, teacher: Option<Uuid>) -> Result<Vec<User>, Problem> {
        let mut filter = doc! { "role": Role::Student.to_string() };
        if let Some(teacher) = teacher {
            filter.insert("teacher_id", teacher.to_string());
        }
        self.list::<User>(filter, Some(doc! { "full_name": 1 }), None)
            .await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<User, Problem> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| problem::not_found(id))?;
        user.role = role;
        user.updated_at = Utc::now();
        self.replace(&user).await?;
        tracing::info!("Changed role of user {} to {}", id, role);
        Ok(user)
    }

    async fn assign_teacher(&self, id: Uuid, teacher: Option<Uuid>) -> Result<User, Problem> {
        if let Some(teacher) = teacher {
            let is_teacher = self
                .get_user(teacher)
                .await?
                .map(|it| it.role.is_staff())
                .unwrap_or(false);
            if !is_teacher {
                return Err(problem::not_a_teacher(teacher));
            }
        }

        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| problem::not_found(id))?;
        user.teacher_id = teacher;
        user.updated_at = Utc::now();
        self.replace(&user).await?;
        Ok(user)
    }
}
