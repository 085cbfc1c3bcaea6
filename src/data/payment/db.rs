use bson::doc;
use chrono::Utc;
use mongodb::Database;
use uuid::Uuid;

use super::{NewPaymentNotification, NotificationStatus, PaymentNotification};
use crate::data::class::Class;
use crate::data::{filter, RecordDbExt};
use crate::middleware::paging::PageState;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

pub trait PaymentDbExt {
    async fn payments(
        &self,
        status: Option<NotificationStatus>,
        page: PageState,
    ) -> Result<Vec<PaymentNotification>, Problem>;

    async fn payments_of_student(&self, student: Uuid)
        -> Result<Vec<PaymentNotification>, Problem>;

    async fn notify_payment(
        &self,
        student: Uuid,
        data: NewPaymentNotification,
    ) -> Result<PaymentNotification, Problem>;

    /// Confirms the payment and marks the linked class as paid.
    async fn confirm_payment(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<PaymentNotification, Problem>;

    async fn reject_payment(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<PaymentNotification, Problem>;
}

async fn decide(
    db: &Database,
    id: Uuid,
    status: NotificationStatus,
    note: Option<String>,
) -> Result<PaymentNotification, Problem> {
    let mut payment = db
        .get::<PaymentNotification>(id)
        .await?
        .ok_or_else(|| problems::not_found("Payment notification", id))?;
    payment.status = status;
    if note.is_some() {
        payment.admin_note = note;
    }
    payment.updated_at = Utc::now();
    db.replace(&payment).await?;
    tracing::info!("Payment notification {} is now {}", id, status.as_str());
    Ok(payment)
}

impl PaymentDbExt for Database {
    async fn payments(
        &self,
        status: Option<NotificationStatus>,
        page: PageState,
    ) -> Result<Vec<PaymentNotification>, Problem> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };
        self.list::<PaymentNotification>(filter, Some(doc! { "created_at": -1 }), Some(page))
            .await
    }

    async fn payments_of_student(
        &self,
        student: Uuid,
    ) -> Result<Vec<PaymentNotification>, Problem> {
        self.list::<PaymentNotification>(
            filter::by_student(student),
            Some(doc! { "created_at": -1 }),
            None,
        )
        .await
    }

    async fn notify_payment(
        &self,
        student: Uuid,
        data: NewPaymentNotification,
    ) -> Result<PaymentNotification, Problem> {
        data.validate()?;
        if let Some(class_id) = data.class_id {
            let owned = self
                .get::<Class>(class_id)
                .await?
                .map(|it| it.student_id == student)
                .unwrap_or(false);
            if !owned {
                return Err(problems::bad_field(
                    "class_id",
                    "Linked class doesn't belong to you.",
                ));
            }
        }

        let notification = data.into_notification(student);
        self.insert(&notification).await?;
        tracing::info!(
            "Student {} notified a payment of {} {}",
            student,
            notification.amount,
            notification.currency
        );
        Ok(notification)
    }

    async fn confirm_payment(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<PaymentNotification, Problem> {
        let payment = decide(self, id, NotificationStatus::Confirmed, note).await?;

        if let Some(class_id) = payment.class_id {
            match self.get::<Class>(class_id).await? {
                Some(mut class) => {
                    class.mark_paid(Utc::now());
                    self.replace(&class).await?;
                }
                None => tracing::warn!(
                    "Confirmed payment {} links to missing class {}",
                    id,
                    class_id
                ),
            }
        }

        Ok(payment)
    }

    async fn reject_payment(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<PaymentNotification, Problem> {
        decide(self, id, NotificationStatus::Rejected, note).await
    }
}
