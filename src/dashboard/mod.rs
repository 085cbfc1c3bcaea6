//! Derived counts shown on the staff and student dashboards.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::data::class::Class;
use crate::data::class_request::{ClassRequest, RequestStatus};
use crate::data::homework::{Homework, HomeworkStatus};
use crate::data::payment::{NotificationStatus, PaymentNotification};

pub mod feed;

/// How far ahead "upcoming" classes are counted.
pub const UPCOMING_DAYS: i64 = 7;

/// Current records the staff snapshot is computed from.
#[derive(Debug, Clone, Default)]
pub struct DashboardInputs {
    pub class_requests: Vec<ClassRequest>,
    pub payments: Vec<PaymentNotification>,
    pub homework: Vec<Homework>,
    pub classes: Vec<Class>,
    pub unread_messages: u64,
    pub reviews_to_approve: u64,
    pub students: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardSnapshot {
    pub pending_requests: usize,
    pub awaiting_payment_requests: usize,
    pub pending_payments: usize,
    /// Sum of pending payment amounts, minor units.
    pub pending_payment_total: i64,
    pub homework_to_review: usize,
    pub overdue_homework: usize,
    pub upcoming_classes: usize,
    pub classes_today: usize,
    pub unread_messages: u64,
    pub reviews_to_approve: u64,
    pub students: u64,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn derive(inputs: &DashboardInputs, now: DateTime<Utc>, tz: Tz) -> DashboardSnapshot {
        let requests_in = |status: RequestStatus| {
            inputs
                .class_requests
                .iter()
                .filter(|it| it.status == status)
                .count()
        };

        let pending_payments: Vec<&PaymentNotification> = inputs
            .payments
            .iter()
            .filter(|it| it.status == NotificationStatus::Pending)
            .collect();

        let horizon = now + Duration::days(UPCOMING_DAYS);
        let today = now.with_timezone(&tz).date_naive();
        let active = || inputs.classes.iter().filter(|it| it.status.blocks_schedule());

        DashboardSnapshot {
            pending_requests: requests_in(RequestStatus::Pending),
            awaiting_payment_requests: requests_in(RequestStatus::AwaitingPayment),
            pending_payments: pending_payments.len(),
            pending_payment_total: pending_payments.iter().map(|it| it.amount).sum(),
            homework_to_review: inputs
                .homework
                .iter()
                .filter(|it| it.status == HomeworkStatus::Submitted)
                .count(),
            overdue_homework: inputs.homework.iter().filter(|it| it.is_overdue(now)).count(),
            upcoming_classes: active()
                .filter(|it| it.starts_at >= now && it.starts_at < horizon)
                .count(),
            classes_today: active()
                .filter(|it| it.starts_at.with_timezone(&tz).date_naive() == today)
                .count(),
            unread_messages: inputs.unread_messages,
            reviews_to_approve: inputs.reviews_to_approve,
            students: inputs.students,
            generated_at: now,
        }
    }
}

/// What a student sees on their own dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StudentSummary {
    pub upcoming_classes: Vec<Class>,
    pub completed_classes: usize,
    pub homework_assigned: usize,
    pub homework_overdue: usize,
    pub homework_submitted: usize,
    pub pending_payments: usize,
    pub unpaid_classes: usize,
    pub open_requests: usize,
}

impl StudentSummary {
    pub fn derive(
        mut classes: Vec<Class>,
        homework: &[Homework],
        payments: &[PaymentNotification],
        requests: &[ClassRequest],
        now: DateTime<Utc>,
    ) -> StudentSummary {
        use crate::data::class::{ClassStatus, PaymentStatus};

        let completed_classes = classes
            .iter()
            .filter(|it| it.status == ClassStatus::Completed)
            .count();
        let unpaid_classes = classes
            .iter()
            .filter(|it| it.status.blocks_schedule() && it.payment_status != PaymentStatus::Paid)
            .count();

        classes.retain(|it| it.status.blocks_schedule() && it.ends_at() > now);
        classes.sort_by_key(|it| it.starts_at);

        let homework_in = |status: HomeworkStatus| homework.iter().filter(|it| it.status == status).count();

        StudentSummary {
            upcoming_classes: classes,
            completed_classes,
            homework_assigned: homework_in(HomeworkStatus::Assigned),
            homework_overdue: homework.iter().filter(|it| it.is_overdue(now)).count(),
            homework_submitted: homework_in(HomeworkStatus::Submitted),
            pending_payments: payments
                .iter()
                .filter(|it| it.status == NotificationStatus::Pending)
                .count(),
            unpaid_classes,
            open_requests: requests.iter().filter(|it| it.status.is_open()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::tests::class_at;
    use crate::data::class::ClassStatus;
    use crate::data::homework::tests::homework_due;
    use crate::data::payment::tests::notification;
    use chrono::TimeZone;

    fn monday_morning() -> DateTime<Utc> {
        // Classes built by `class_at` are on Monday 2030-03-04.
        Utc.with_ymd_and_hms(2030, 3, 4, 8, 0, 0).unwrap()
    }

    fn request(status: RequestStatus) -> ClassRequest {
        ClassRequest {
            id: uuid::Uuid::new_v4(),
            student_id: uuid::Uuid::new_v4(),
            requested_slots: vec![],
            message: None,
            status,
            teacher_proposal: None,
            teacher_note: None,
            created_at: monday_morning(),
            updated_at: monday_morning(),
        }
    }

    #[test]
    fn snapshot_counts() {
        let now = monday_morning();
        let mut next_week = class_at(10, 60, ClassStatus::Scheduled);
        next_week.starts_at = now + Duration::days(8);

        let inputs = DashboardInputs {
            class_requests: vec![
                request(RequestStatus::Pending),
                request(RequestStatus::Pending),
                request(RequestStatus::AwaitingPayment),
                request(RequestStatus::Approved),
            ],
            payments: vec![
                notification(3000, NotificationStatus::Pending),
                notification(4500, NotificationStatus::Pending),
                notification(9999, NotificationStatus::Confirmed),
            ],
            homework: vec![
                homework_due(now - Duration::days(2), HomeworkStatus::Assigned),
                homework_due(now + Duration::days(2), HomeworkStatus::Assigned),
                homework_due(now - Duration::days(2), HomeworkStatus::Submitted),
            ],
            classes: vec![
                class_at(10, 60, ClassStatus::Scheduled),
                class_at(12, 60, ClassStatus::PendingPayment),
                class_at(14, 60, ClassStatus::Cancelled),
                next_week,
            ],
            unread_messages: 3,
            reviews_to_approve: 1,
            students: 12,
        };

        let snapshot = DashboardSnapshot::derive(&inputs, now, Tz::UTC);
        assert_eq!(snapshot.pending_requests, 2);
        assert_eq!(snapshot.awaiting_payment_requests, 1);
        assert_eq!(snapshot.pending_payments, 2);
        assert_eq!(snapshot.pending_payment_total, 7500);
        assert_eq!(snapshot.homework_to_review, 1);
        assert_eq!(snapshot.overdue_homework, 1);
        assert_eq!(snapshot.upcoming_classes, 2);
        assert_eq!(snapshot.classes_today, 2);
        assert_eq!(snapshot.unread_messages, 3);
        assert_eq!(snapshot.students, 12);
    }

    #[test]
    fn today_is_taken_in_business_timezone() {
        // 23:30 UTC Monday is already Tuesday in Madrid.
        let now = Utc.with_ymd_and_hms(2030, 3, 4, 23, 30, 0).unwrap();
        let inputs = DashboardInputs {
            classes: vec![class_at(10, 60, ClassStatus::Scheduled)],
            ..Default::default()
        };

        assert_eq!(DashboardSnapshot::derive(&inputs, now, Tz::UTC).classes_today, 1);
        assert_eq!(
            DashboardSnapshot::derive(&inputs, now, chrono_tz::Europe::Madrid).classes_today,
            0
        );
    }

    #[test]
    fn student_summary_lists_upcoming_in_order() {
        let now = monday_morning();
        let classes = vec![
            class_at(15, 60, ClassStatus::Scheduled),
            class_at(9, 60, ClassStatus::PendingPayment),
            class_at(7, 30, ClassStatus::Completed),
            class_at(11, 60, ClassStatus::Cancelled),
        ];

        let summary = StudentSummary::derive(
            classes,
            &[homework_due(now - Duration::days(1), HomeworkStatus::Assigned)],
            &[notification(3000, NotificationStatus::Pending)],
            &[request(RequestStatus::TeacherEdited), request(RequestStatus::Rejected)],
            now,
        );

        let starts: Vec<_> = summary.upcoming_classes.iter().map(|it| it.starts_at).collect();
        assert_eq!(
            starts,
            vec![
                Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2030, 3, 4, 15, 0, 0).unwrap(),
            ]
        );
        assert_eq!(summary.completed_classes, 1);
        assert_eq!(summary.unpaid_classes, 2);
        assert_eq!(summary.homework_overdue, 1);
        assert_eq!(summary.pending_payments, 1);
        assert_eq!(summary.open_requests, 1);
    }
}
