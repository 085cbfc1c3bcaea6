use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Record;
use crate::resp::auth::AuthToken;
use crate::role::Role;

pub mod db;

/// Profile of an account held by the auth provider. `id` is the provider's subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// English level, free form ("B1", "upper intermediate", ...).
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Teacher responsible for this student.
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl User {
    pub fn from_token(auth: &AuthToken) -> User {
        let now = Utc::now();
        tracing::info!("Creating profile for user: {}", auth.user);

        User {
            id: auth.user,
            email: auth
                .email
                .as_deref()
                .map(crate::util::normalize_email)
                .unwrap_or_default(),
            role: auth.role,
            full_name: None,
            phone: None,
            locale: None,
            timezone: None,
            level: None,
            notes: None,
            teacher_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        self.full_name = update.full_name;
        self.phone = update.phone;
        self.locale = update.locale;
        self.timezone = update.timezone;
        self.level = update.level;
        self.updated_at = Utc::now();
    }
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TeacherAssignment {
    pub teacher_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_update_keeps_identity_and_role() {
        let auth = AuthToken {
            user: Uuid::new_v4(),
            email: Some("ana@example.com".to_string()),
            role: Role::Student,
            expires: Utc::now(),
        };
        let mut user = User::from_token(&auth);
        user.teacher_id = Some(Uuid::new_v4());
        let teacher = user.teacher_id;

        user.apply(ProfileUpdate {
            full_name: Some("Ana López".to_string()),
            phone: None,
            locale: Some("es".to_string()),
            timezone: None,
            level: Some("B2".to_string()),
        });

        assert_eq!(user.id, auth.user);
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.teacher_id, teacher);
        assert_eq!(user.full_name.as_deref(), Some("Ana López"));
        assert_eq!(user.locale.as_deref(), Some("es"));
    }
}
