use bson::doc;
use chrono::Utc;
use mongodb::Database;
use uuid::Uuid;

use super::{
    slots_span, validate_slots, ApproveRequest, ClassRequest, ClassRequestData, NewClassRequest,
    Proposal, RequestStatus,
};
use crate::data::class::db::{problem as class_problem, ClassDbExt};
use crate::data::class::{find_overlap, Class};
use crate::data::{filter, RecordDbExt};
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

pub mod problem {
    use crate::data::class_request::RequestStatus;
    use crate::resp::problem::{problems, Problem};

    #[inline]
    pub fn not_pending(status: RequestStatus) -> Problem {
        problems::conflict("Class request can no longer be changed by the student.")
            .insert_str("status", status.as_str())
            .to_owned()
    }

    #[inline]
    pub fn nothing_to_accept() -> Problem {
        problems::conflict("Class request has no teacher proposal to accept.")
    }

    #[inline]
    pub fn already_approved() -> Problem {
        problems::conflict("Class request is already approved.")
    }
}

pub trait ClassRequestDbExt {
    async fn class_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ClassRequest>, Problem>;

    async fn class_requests_of_student(&self, student: Uuid) -> Result<Vec<ClassRequest>, Problem>;

    async fn create_class_request(
        &self,
        student: Uuid,
        data: NewClassRequest,
    ) -> Result<ClassRequest, Problem>;

    async fn update_class_request(
        &self,
        id: Uuid,
        data: ClassRequestData,
    ) -> Result<ClassRequest, Problem>;

    async fn propose(&self, id: Uuid, proposal: Proposal) -> Result<ClassRequest, Problem>;

    /// Creates one class per effective slot and marks the request approved.
    async fn approve(
        &self,
        id: Uuid,
        options: ApproveRequest,
    ) -> Result<(ClassRequest, Vec<Class>), Problem>;

    async fn reject(&self, id: Uuid, note: Option<String>) -> Result<ClassRequest, Problem>;

    async fn accept_proposal(&self, student: Uuid, id: Uuid) -> Result<ClassRequest, Problem>;

    async fn withdraw(&self, student: Uuid, id: Uuid) -> Result<(), Problem>;
}

async fn request_or_404(db: &Database, id: Uuid) -> Result<ClassRequest, Problem> {
    db.get::<ClassRequest>(id)
        .await?
        .ok_or_else(|| problems::not_found("Class request", id))
}

async fn own_request(db: &Database, student: Uuid, id: Uuid) -> Result<ClassRequest, Problem> {
    let request = request_or_404(db, id).await?;
    // Other students' requests look like missing ones.
    if request.student_id != student {
        return Err(problems::not_found("Class request", id));
    }
    Ok(request)
}

impl ClassRequestDbExt for Database {
    async fn class_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ClassRequest>, Problem> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };
        self.list::<ClassRequest>(filter, Some(doc! { "created_at": -1 }), None)
            .await
    }

    async fn class_requests_of_student(&self, student: Uuid) -> Result<Vec<ClassRequest>, Problem> {
        self.list::<ClassRequest>(
            filter::by_student(student),
            Some(doc! { "created_at": -1 }),
            None,
        )
        .await
    }

    async fn create_class_request(
        &self,
        student: Uuid,
        data: NewClassRequest,
    ) -> Result<ClassRequest, Problem> {
        validate_slots("requested_slots", &data.requested_slots)?;
        let now = Utc::now();
        if data.requested_slots.iter().any(|it| it.starts_at <= now) {
            return Err(problems::bad_field(
                "requested_slots",
                "Requested slots must be in the future.",
            ));
        }

        let request = ClassRequest {
            id: Uuid::new_v4(),
            student_id: student,
            requested_slots: data.requested_slots,
            message: data.message,
            status: RequestStatus::Pending,
            teacher_proposal: None,
            teacher_note: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(&request).await?;
        tracing::info!("Student {} requested {} slot(s)", student, request.requested_slots.len());
        Ok(request)
    }

    async fn update_class_request(
        &self,
        id: Uuid,
        data: ClassRequestData,
    ) -> Result<ClassRequest, Problem> {
        validate_slots("requested_slots", &data.requested_slots)?;
        if let Some(proposal) = &data.teacher_proposal {
            validate_slots("teacher_proposal", proposal)?;
        }

        let mut request = request_or_404(self, id).await?;
        request.requested_slots = data.requested_slots;
        request.message = data.message;
        request.status = data.status;
        request.teacher_proposal = data.teacher_proposal;
        request.teacher_note = data.teacher_note;
        request.updated_at = Utc::now();
        self.replace(&request).await?;
        Ok(request)
    }

    async fn propose(&self, id: Uuid, proposal: Proposal) -> Result<ClassRequest, Problem> {
        validate_slots("slots", &proposal.slots)?;

        let mut request = request_or_404(self, id).await?;
        request.propose(proposal, Utc::now())?;
        self.replace(&request).await?;
        Ok(request)
    }

    async fn approve(
        &self,
        id: Uuid,
        options: ApproveRequest,
    ) -> Result<(ClassRequest, Vec<Class>), Problem> {
        options.validate()?;

        let mut request = request_or_404(self, id).await?;
        request.ensure_approvable()?;

        let now = Utc::now();
        let classes = request.classes_for(&options, now)?;

        if !options.allow_overlap {
            if let Some(span) = slots_span(request.effective_slots()) {
                let nearby = self.active_classes_between(&span).await?;
                for class in &classes {
                    if let Some(other) = find_overlap(&nearby, &class.interval(), None) {
                        return Err(class_problem::overlapping(other));
                    }
                }
            }
        }

        for class in &classes {
            self.insert(class).await?;
        }

        request.mark_approved(now);
        self.replace(&request).await?;
        tracing::info!("Approved class request {} into {} class(es)", id, classes.len());

        Ok((request, classes))
    }

    async fn reject(&self, id: Uuid, note: Option<String>) -> Result<ClassRequest, Problem> {
        let mut request = request_or_404(self, id).await?;
        request.status = RequestStatus::Rejected;
        if note.is_some() {
            request.teacher_note = note;
        }
        request.updated_at = Utc::now();
        self.replace(&request).await?;
        Ok(request)
    }

    async fn accept_proposal(&self, student: Uuid, id: Uuid) -> Result<ClassRequest, Problem> {
        let mut request = own_request(self, student, id).await?;
        if !request.accept_proposal() {
            return Err(problem::nothing_to_accept());
        }
        self.replace(&request).await?;
        Ok(request)
    }

    async fn withdraw(&self, student: Uuid, id: Uuid) -> Result<(), Problem> {
        let request = own_request(self, student, id).await?;
        if request.status != RequestStatus::Pending {
            return Err(problem::not_pending(request.status));
        }
        self.remove::<ClassRequest>(id).await?;
        Ok(())
    }
}
