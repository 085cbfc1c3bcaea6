use chrono::{DateTime, Utc};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::class::{default_currency, normalize_currency};
use super::Record;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;

pub mod db;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    #[field(value = "pending")]
    Pending,
    #[field(value = "confirmed")]
    Confirmed,
    #[field(value = "rejected")]
    Rejected,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Confirmed => "confirmed",
            NotificationStatus::Rejected => "rejected",
        }
    }
}

/// A student's claim that a payment was made, waiting on staff to confirm it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Minor currency units.
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub status: NotificationStatus,
    #[serde(default)]
    pub admin_note: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for PaymentNotification {
    const COLLECTION: &'static str = "payment_notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPaymentNotification {
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub class_id: Option<Uuid>,
}

impl NewPaymentNotification {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.amount <= 0 {
            return Err(bad_field("amount", "Amount must be positive."));
        }
        normalize_currency("currency", &self.currency)?;
        Ok(())
    }

    pub fn into_notification(self, student: Uuid) -> PaymentNotification {
        let now = Utc::now();
        PaymentNotification {
            id: Uuid::new_v4(),
            student_id: student,
            amount: self.amount,
            currency: self.currency.trim().to_ascii_uppercase(),
            method: self.method,
            reference: self.reference,
            receipt_url: self.receipt_url,
            class_id: self.class_id,
            status: NotificationStatus::Pending,
            admin_note: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentDecision {
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn notification(amount: i64, status: NotificationStatus) -> PaymentNotification {
        let mut notification = NewPaymentNotification {
            amount,
            currency: "eur".to_string(),
            method: Some("transfer".to_string()),
            reference: None,
            receipt_url: None,
            class_id: None,
        }
        .into_notification(Uuid::new_v4());
        notification.status = status;
        notification
    }

    #[test]
    fn new_notifications_are_pending() {
        let n = notification(3000, NotificationStatus::Pending);
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.currency, "EUR");
    }

    #[test]
    fn amount_and_currency_are_checked() {
        let mut data = NewPaymentNotification {
            amount: 0,
            currency: "EUR".to_string(),
            method: None,
            reference: None,
            receipt_url: None,
            class_id: None,
        };
        assert!(data.validate().is_err());

        data.amount = 1500;
        assert!(data.validate().is_ok());

        data.currency = "EURO".to_string();
        assert!(data.validate().is_err());
    }
}
