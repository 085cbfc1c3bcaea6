use chrono::{DateTime, Duration, Utc};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::class::{default_currency, normalize_currency, Class, ClassStatus, PaymentStatus};
use super::Record;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::schedule::Interval;

pub mod db;

/// Most slots a single request may ask for.
pub const MAX_REQUESTED_SLOTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[field(value = "pending")]
    Pending,
    #[field(value = "awaiting_payment")]
    AwaitingPayment,
    #[field(value = "payment_confirmed")]
    PaymentConfirmed,
    #[field(value = "approved")]
    Approved,
    #[field(value = "rejected")]
    Rejected,
    #[field(value = "teacher_edited")]
    TeacherEdited,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::AwaitingPayment => "awaiting_payment",
            RequestStatus::PaymentConfirmed => "payment_confirmed",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::TeacherEdited => "teacher_edited",
        }
    }

    /// Neither approved nor rejected yet.
    pub fn is_open(self) -> bool {
        !matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestedSlot {
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl RequestedSlot {
    pub fn interval(&self) -> Interval {
        Interval::new(
            self.starts_at,
            self.starts_at + Duration::minutes(self.duration_minutes as i64),
        )
    }
}

pub fn validate_slots(field: &str, slots: &[RequestedSlot]) -> Result<(), Problem> {
    if slots.is_empty() {
        return Err(bad_field(field, "At least one slot is required."));
    }
    if slots.len() > MAX_REQUESTED_SLOTS {
        return Err(bad_field(
            field,
            format!("No more than {} slots per request.", MAX_REQUESTED_SLOTS),
        ));
    }
    if slots
        .iter()
        .any(|it| it.duration_minutes == 0 || it.duration_minutes > 8 * 60)
    {
        return Err(bad_field(
            field,
            "Slot duration must be between 1 and 480 minutes.",
        ));
    }
    for (i, a) in slots.iter().enumerate() {
        if slots[i + 1..]
            .iter()
            .any(|b| a.interval().overlaps(&b.interval()))
        {
            return Err(bad_field(field, "Requested slots overlap each other."));
        }
    }
    Ok(())
}

/// Smallest interval covering every slot.
pub fn slots_span(slots: &[RequestedSlot]) -> Option<Interval> {
    let start = slots.iter().map(|it| it.starts_at).min()?;
    let end = slots.iter().map(|it| it.interval().end).max()?;
    Some(Interval::new(start, end))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub requested_slots: Vec<RequestedSlot>,
    #[serde(default)]
    pub message: Option<String>,
    pub status: RequestStatus,
    /// Counter-proposal made by the teacher.
    #[serde(default)]
    pub teacher_proposal: Option<Vec<RequestedSlot>>,
    #[serde(default)]
    pub teacher_note: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for ClassRequest {
    const COLLECTION: &'static str = "class_requests";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl ClassRequest {
    /// Slots that become classes on approval: the teacher's proposal wins when present.
    pub fn effective_slots(&self) -> &[RequestedSlot] {
        match &self.teacher_proposal {
            Some(proposal) if !proposal.is_empty() => proposal,
            _ => &self.requested_slots,
        }
    }

    /// Approved requests already produced their classes.
    pub fn ensure_approvable(&self) -> Result<(), Problem> {
        if self.status == RequestStatus::Approved {
            return Err(db::problem::already_approved());
        }
        Ok(())
    }

    /// Classes created when the request is approved, one per effective slot.
    pub fn classes_for(
        &self,
        options: &ApproveRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Class>, Problem> {
        options.validate()?;
        let currency = match &options.currency {
            Some(currency) => normalize_currency("currency", currency)?,
            None => default_currency(),
        };
        let (status, payment_status) = if options.paid {
            (ClassStatus::Scheduled, PaymentStatus::Paid)
        } else {
            (ClassStatus::PendingPayment, PaymentStatus::Unpaid)
        };

        Ok(self
            .effective_slots()
            .iter()
            .map(|slot| Class {
                id: Uuid::new_v4(),
                student_id: self.student_id,
                teacher_id: None,
                title: options.title.clone().unwrap_or_default(),
                starts_at: slot.starts_at,
                duration_minutes: slot.duration_minutes,
                status,
                payment_status,
                amount: options.amount,
                currency: currency.clone(),
                meeting_url: None,
                notes: self.message.clone(),
                class_request_id: Some(self.id),
                created_at: now,
                updated_at: now,
            })
            .collect())
    }

    pub fn mark_approved(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.updated_at = now;
    }

    /// Teacher counter-proposal; the student has to accept it before approval.
    pub fn propose(&mut self, proposal: Proposal, now: DateTime<Utc>) -> Result<(), Problem> {
        validate_slots("slots", &proposal.slots)?;
        self.teacher_proposal = Some(proposal.slots);
        self.teacher_note = proposal.note;
        self.status = RequestStatus::TeacherEdited;
        self.updated_at = now;
        Ok(())
    }

    /// Student takes over the teacher's proposal; the request goes back to pending.
    pub fn accept_proposal(&mut self) -> bool {
        match self.teacher_proposal.take() {
            Some(proposal) if self.status == RequestStatus::TeacherEdited => {
                self.requested_slots = proposal;
                self.status = RequestStatus::Pending;
                self.updated_at = Utc::now();
                true
            }
            other => {
                self.teacher_proposal = other;
                false
            }
        }
    }
}

/// Body of a student's request for lessons.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewClassRequest {
    pub requested_slots: Vec<RequestedSlot>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Whole-record update issued from the admin screens.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClassRequestData {
    pub requested_slots: Vec<RequestedSlot>,
    #[serde(default)]
    pub message: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub teacher_proposal: Option<Vec<RequestedSlot>>,
    #[serde(default)]
    pub teacher_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Proposal {
    pub slots: Vec<RequestedSlot>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApproveRequest {
    /// Price per created class, in minor units.
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Create classes as already scheduled instead of pending payment.
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub allow_overlap: bool,
}

impl ApproveRequest {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.amount < 0 {
            return Err(bad_field("amount", "Amount can't be negative."));
        }
        if let Some(currency) = &self.currency {
            normalize_currency("currency", currency)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(hour: u32) -> RequestedSlot {
        RequestedSlot {
            starts_at: Utc.with_ymd_and_hms(2030, 3, 4, hour, 0, 0).unwrap(),
            duration_minutes: 60,
        }
    }

    fn request(status: RequestStatus) -> ClassRequest {
        ClassRequest {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            requested_slots: vec![slot(9)],
            message: None,
            status,
            teacher_proposal: None,
            teacher_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn proposal_takes_precedence_on_approval() {
        let mut req = request(RequestStatus::TeacherEdited);
        assert_eq!(req.effective_slots(), &[slot(9)]);

        req.teacher_proposal = Some(vec![slot(11), slot(12)]);
        assert_eq!(req.effective_slots(), &[slot(11), slot(12)]);

        req.teacher_proposal = Some(vec![]);
        assert_eq!(req.effective_slots(), &[slot(9)]);
    }

    #[test]
    fn accepting_proposal_reopens_request() {
        let mut req = request(RequestStatus::TeacherEdited);
        req.teacher_proposal = Some(vec![slot(15)]);

        assert!(req.accept_proposal());
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.requested_slots, vec![slot(15)]);
        assert!(req.teacher_proposal.is_none());
    }

    #[test]
    fn accepting_without_proposal_changes_nothing() {
        let mut req = request(RequestStatus::Pending);
        req.teacher_proposal = Some(vec![slot(15)]);

        assert!(!req.accept_proposal());
        assert_eq!(req.requested_slots, vec![slot(9)]);
        assert_eq!(req.teacher_proposal, Some(vec![slot(15)]));
    }

    #[test]
    fn slot_list_validation() {
        assert!(validate_slots("requested_slots", &[]).is_err());
        assert!(validate_slots("requested_slots", &[slot(9), slot(10)]).is_ok());

        let clash = RequestedSlot {
            starts_at: Utc.with_ymd_and_hms(2030, 3, 4, 9, 30, 0).unwrap(),
            duration_minutes: 60,
        };
        assert!(validate_slots("requested_slots", &[slot(9), clash]).is_err());

        let too_many: Vec<_> = (0..=MAX_REQUESTED_SLOTS as u32)
            .map(|i| RequestedSlot {
                starts_at: Utc.with_ymd_and_hms(2030, 4, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64 * 2),
                duration_minutes: 60,
            })
            .collect();
        assert!(validate_slots("requested_slots", &too_many).is_err());
    }

    #[test]
    fn approval_creates_unpaid_classes_from_effective_slots() {
        let mut req = request(RequestStatus::TeacherEdited);
        req.message = Some("Exam prep".to_string());
        req.teacher_proposal = Some(vec![slot(11), slot(14)]);
        let now = Utc::now();
        let options = ApproveRequest {
            amount: 3000,
            currency: Some("usd".to_string()),
            title: Some("Grammar".to_string()),
            ..Default::default()
        };

        let classes = req.classes_for(&options, now).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].starts_at, slot(11).starts_at);
        assert_eq!(classes[1].starts_at, slot(14).starts_at);
        for class in &classes {
            assert_eq!(class.student_id, req.student_id);
            assert_eq!(class.class_request_id, Some(req.id));
            assert_eq!(class.status, ClassStatus::PendingPayment);
            assert_eq!(class.payment_status, PaymentStatus::Unpaid);
            assert_eq!(class.duration_minutes, 60);
            assert_eq!(class.amount, 3000);
            assert_eq!(class.currency, "USD");
            assert_eq!(class.title, "Grammar");
            assert_eq!(class.notes.as_deref(), Some("Exam prep"));
            assert_eq!(class.created_at, now);
        }
        assert_ne!(classes[0].id, classes[1].id);
    }

    #[test]
    fn approval_as_paid_schedules_classes() {
        let req = request(RequestStatus::PaymentConfirmed);
        let options = ApproveRequest {
            paid: true,
            ..Default::default()
        };

        let classes = req.classes_for(&options, Utc::now()).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].starts_at, slot(9).starts_at);
        assert_eq!(classes[0].status, ClassStatus::Scheduled);
        assert_eq!(classes[0].payment_status, PaymentStatus::Paid);
        assert_eq!(classes[0].currency, "EUR");
    }

    #[test]
    fn approval_options_are_checked() {
        let req = request(RequestStatus::Pending);
        let negative = ApproveRequest {
            amount: -5,
            ..Default::default()
        };
        assert!(req.classes_for(&negative, Utc::now()).is_err());

        let bad_currency = ApproveRequest {
            currency: Some("euro".to_string()),
            ..Default::default()
        };
        assert!(bad_currency.validate().is_err());
        assert!(req.classes_for(&bad_currency, Utc::now()).is_err());
    }

    #[test]
    fn approved_requests_cannot_be_approved_again() {
        let mut req = request(RequestStatus::Pending);
        assert!(req.ensure_approvable().is_ok());

        let now = Utc::now();
        req.mark_approved(now);
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.updated_at, now);

        let problem = req.ensure_approvable().unwrap_err();
        assert_eq!(problem.status, rocket::http::Status::Conflict);

        assert!(request(RequestStatus::Rejected).ensure_approvable().is_ok());
    }

    #[test]
    fn proposal_marks_request_teacher_edited() {
        let mut req = request(RequestStatus::Pending);
        let proposal = Proposal {
            slots: vec![slot(16)],
            note: Some("Afternoons suit me better".to_string()),
        };

        req.propose(proposal, Utc::now()).unwrap();
        assert_eq!(req.status, RequestStatus::TeacherEdited);
        assert_eq!(req.teacher_proposal, Some(vec![slot(16)]));
        assert_eq!(req.teacher_note.as_deref(), Some("Afternoons suit me better"));
        assert_eq!(req.effective_slots(), &[slot(16)]);

        let empty = Proposal {
            slots: vec![],
            note: None,
        };
        let mut untouched = request(RequestStatus::Pending);
        assert!(untouched.propose(empty, Utc::now()).is_err());
        assert_eq!(untouched.status, RequestStatus::Pending);
    }

    #[test]
    fn span_covers_all_slots() {
        assert_eq!(slots_span(&[]), None);
        let span = slots_span(&[slot(14), slot(9), slot(11)]).unwrap();
        assert_eq!(span.start, slot(9).starts_at);
        assert_eq!(span.end, slot(14).interval().end);
    }

    #[test]
    fn open_statuses() {
        assert!(RequestStatus::TeacherEdited.is_open());
        assert!(RequestStatus::AwaitingPayment.is_open());
        assert!(!RequestStatus::Rejected.is_open());
        assert!(!RequestStatus::Approved.is_open());
    }
}
