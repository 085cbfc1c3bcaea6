use chrono::{DateTime, Duration, Utc};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Record;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::schedule::Interval;

pub mod db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    #[field(value = "pending_payment")]
    PendingPayment,
    #[field(value = "scheduled")]
    Scheduled,
    #[field(value = "completed")]
    Completed,
    #[field(value = "cancelled")]
    Cancelled,
}

impl ClassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassStatus::PendingPayment => "pending_payment",
            ClassStatus::Scheduled => "scheduled",
            ClassStatus::Completed => "completed",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the class still occupies its time slot.
    pub fn blocks_schedule(self) -> bool {
        matches!(self, ClassStatus::PendingPayment | ClassStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Class {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: ClassStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Price in minor currency units.
    #[serde(default)]
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub class_request_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

pub fn default_currency() -> String {
    "EUR".to_string()
}

/// Upper-cased three letter currency code.
pub fn normalize_currency(field: &str, currency: &str) -> Result<String, Problem> {
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(bad_field(field, "Currency must be a 3 letter code."));
    }
    Ok(currency.to_ascii_uppercase())
}

impl Record for Class {
    const COLLECTION: &'static str = "classes";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Class {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.starts_at, self.ends_at())
    }

    /// Records a confirmed payment. A class waiting on payment becomes scheduled.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        if self.status == ClassStatus::PendingPayment {
            self.status = ClassStatus::Scheduled;
        }
        self.updated_at = now;
    }
}

/// Body of class create and whole-record update requests.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClassData {
    pub student_id: Uuid,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default = "default_class_status")]
    pub status: ClassStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Accept a slot that overlaps another active class.
    #[serde(default)]
    pub allow_overlap: bool,
}

fn default_class_status() -> ClassStatus {
    ClassStatus::PendingPayment
}

impl ClassData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.duration_minutes == 0 || self.duration_minutes > 8 * 60 {
            return Err(bad_field(
                "duration_minutes",
                "Duration must be between 1 and 480 minutes.",
            ));
        }
        if self.amount < 0 {
            return Err(bad_field("amount", "Amount can't be negative."));
        }
        normalize_currency("currency", &self.currency)?;
        Ok(())
    }

    pub fn interval(&self) -> Interval {
        Interval::new(
            self.starts_at,
            self.starts_at + Duration::minutes(self.duration_minutes as i64),
        )
    }

    pub fn into_class(self, id: Uuid, created_at: DateTime<Utc>) -> Class {
        Class {
            id,
            student_id: self.student_id,
            teacher_id: self.teacher_id,
            title: self.title,
            starts_at: self.starts_at,
            duration_minutes: self.duration_minutes,
            status: self.status,
            payment_status: self.payment_status,
            amount: self.amount,
            currency: self.currency.trim().to_ascii_uppercase(),
            meeting_url: self.meeting_url,
            notes: self.notes,
            class_request_id: None,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

/// First active class in `classes` that overlaps `interval`, ignoring `except`.
pub fn find_overlap<'a>(
    classes: &'a [Class],
    interval: &Interval,
    except: Option<Uuid>,
) -> Option<&'a Class> {
    classes.iter().find(|it| {
        Some(it.id) != except && it.status.blocks_schedule() && it.interval().overlaps(interval)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub fn class_at(hour: u32, minutes: u32, status: ClassStatus) -> Class {
        let starts_at = Utc.with_ymd_and_hms(2030, 3, 4, hour, 0, 0).unwrap();
        ClassData {
            student_id: Uuid::new_v4(),
            teacher_id: None,
            title: "Conversation".to_string(),
            starts_at,
            duration_minutes: minutes,
            status,
            payment_status: PaymentStatus::Unpaid,
            amount: 2500,
            currency: default_currency(),
            meeting_url: None,
            notes: None,
            allow_overlap: false,
        }
        .into_class(Uuid::new_v4(), starts_at)
    }

    #[test]
    fn overlap_ignores_inactive_and_excluded_classes() {
        let booked = class_at(10, 60, ClassStatus::Scheduled);
        let cancelled = class_at(12, 60, ClassStatus::Cancelled);
        let classes = vec![booked.clone(), cancelled];

        let candidate = class_at(10, 30, ClassStatus::PendingPayment).interval();
        assert_eq!(find_overlap(&classes, &candidate, None), Some(&booked));
        assert_eq!(find_overlap(&classes, &candidate, Some(booked.id)), None);

        let over_cancelled = class_at(12, 60, ClassStatus::PendingPayment).interval();
        assert_eq!(find_overlap(&classes, &over_cancelled, None), None);
    }

    #[test]
    fn back_to_back_classes_do_not_overlap() {
        let classes = vec![class_at(10, 60, ClassStatus::Scheduled)];
        let next = class_at(11, 60, ClassStatus::Scheduled).interval();
        assert!(find_overlap(&classes, &next, None).is_none());
    }

    #[test]
    fn validation_bounds_duration_and_amount() {
        let class = class_at(9, 60, ClassStatus::Scheduled);
        let mut data = ClassData {
            student_id: class.student_id,
            teacher_id: None,
            title: class.title,
            starts_at: class.starts_at,
            duration_minutes: 0,
            status: ClassStatus::Scheduled,
            payment_status: PaymentStatus::Unpaid,
            amount: 0,
            currency: default_currency(),
            meeting_url: None,
            notes: None,
            allow_overlap: false,
        };
        assert!(data.validate().is_err());

        data.duration_minutes = 45;
        assert!(data.validate().is_ok());

        data.amount = -1;
        assert!(data.validate().is_err());

        data.amount = 2500;
        data.currency = "us$".to_string();
        assert!(data.validate().is_err());

        data.currency = "usd".to_string();
        assert!(data.validate().is_ok());
        assert_eq!(data.into_class(Uuid::new_v4(), Utc::now()).currency, "USD");
    }

    #[test]
    fn currency_codes_are_upper_cased() {
        assert_eq!(normalize_currency("currency", " gbp ").unwrap(), "GBP");
        assert!(normalize_currency("currency", "EURO").is_err());
        assert!(normalize_currency("currency", "").is_err());
    }

    #[test]
    fn paying_schedules_pending_classes() {
        let now = Utc::now();
        let mut pending = class_at(9, 60, ClassStatus::PendingPayment);
        pending.mark_paid(now);
        assert_eq!(pending.status, ClassStatus::Scheduled);
        assert_eq!(pending.payment_status, PaymentStatus::Paid);
        assert_eq!(pending.updated_at, now);

        let mut done = class_at(9, 60, ClassStatus::Completed);
        done.mark_paid(now);
        assert_eq!(done.status, ClassStatus::Completed);
        assert_eq!(done.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn statuses_use_snake_case() {
        assert_eq!(
            serde_json::to_string(&ClassStatus::PendingPayment).unwrap(),
            "\"pending_payment\""
        );
        assert_eq!(ClassStatus::PendingPayment.as_str(), "pending_payment");
    }
}
