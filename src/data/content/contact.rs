use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{Record, RecordDbExt};
use crate::middleware::paging::PageState;
use crate::resp::problem::problems::{self, bad_field};
use crate::resp::problem::Problem;
use crate::util::{is_valid_email, normalize_email};

const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Record for ContactMessage {
    const COLLECTION: &'static str = "contact_messages";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub locale: Option<String>,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.name.trim().is_empty() {
            return Err(bad_field("name", "Please tell us your name."));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(bad_field("email", "Not a valid e-mail address."));
        }
        let message = self.message.trim();
        if message.is_empty() {
            return Err(bad_field("message", "Message can't be empty."));
        }
        if message.len() > MAX_MESSAGE_LEN {
            return Err(bad_field("message", "Message is too long."));
        }
        Ok(())
    }

    pub fn into_message(self) -> ContactMessage {
        ContactMessage {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            message: self.message.trim().to_string(),
            locale: self.locale,
            read: false,
            created_at: Utc::now(),
        }
    }
}

pub trait ContactDbExt {
    async fn contact_messages(
        &self,
        unread_only: bool,
        page: PageState,
    ) -> Result<Vec<ContactMessage>, Problem>;

    async fn mark_read(&self, id: Uuid, read: bool) -> Result<ContactMessage, Problem>;
}

impl ContactDbExt for Database {
    async fn contact_messages(
        &self,
        unread_only: bool,
        page: PageState,
    ) -> Result<Vec<ContactMessage>, Problem> {
        let filter = if unread_only {
            doc! { "read": false }
        } else {
            doc! {}
        };
        self.list::<ContactMessage>(filter, Some(doc! { "created_at": -1 }), Some(page))
            .await
    }

    async fn mark_read(&self, id: Uuid, read: bool) -> Result<ContactMessage, Problem> {
        let mut message = self
            .get::<ContactMessage>(id)
            .await?
            .ok_or_else(|| problems::not_found("Contact message", id))?;
        message.read = read;
        self.replace(&message).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            locale: None,
        }
    }

    #[test]
    fn contact_form_validation() {
        assert!(form("Ana", "ana@example.com", "Hello!").validate().is_ok());
        assert!(form(" ", "ana@example.com", "Hello!").validate().is_err());
        assert!(form("Ana", "ana@example", "Hello!").validate().is_err());
        assert!(form("Ana", "ana@example.com", "   ").validate().is_err());
        assert!(form("Ana", "ana@example.com", &"x".repeat(MAX_MESSAGE_LEN + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn stored_message_is_trimmed_and_unread() {
        let message = form(" Ana ", " Ana@Example.com", " Hi ").into_message();
        assert_eq!(message.name, "Ana");
        assert_eq!(message.email, "ana@example.com");
        assert_eq!(message.message, "Hi");
        assert!(!message.read);
    }
}
