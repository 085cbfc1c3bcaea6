use bson::{doc, Document};
use chrono::Utc;
use mongodb::Database;
use uuid::Uuid;

use super::{find_overlap, Class, ClassData, ClassStatus};
use crate::data::{filter, RecordDbExt};
use crate::middleware::paging::PageState;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;
use crate::schedule::Interval;

pub mod problem {
    use crate::data::class::Class;
    use crate::resp::problem::{problems, Problem};

    #[inline]
    pub fn overlapping(other: &Class) -> Problem {
        problems::conflict("Class overlaps another booked class.")
            .insert_str("overlaps", other.id)
            .insert_str("starts_at", other.starts_at.to_rfc3339())
            .to_owned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassQuery {
    pub status: Option<ClassStatus>,
    pub student: Option<Uuid>,
}

impl ClassQuery {
    fn filter(&self) -> Document {
        let mut filter = doc! {};
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(student) = self.student {
            filter.insert("student_id", student.to_string());
        }
        filter
    }
}

pub trait ClassDbExt {
    async fn classes(&self, query: ClassQuery, page: PageState) -> Result<Vec<Class>, Problem>;

    async fn classes_of_student(&self, student: Uuid) -> Result<Vec<Class>, Problem>;

    /// Classes that still occupy time and overlap `range`.
    async fn active_classes_between(&self, range: &Interval) -> Result<Vec<Class>, Problem>;

    async fn create_class(&self, data: ClassData) -> Result<Class, Problem>;

    async fn update_class(&self, id: Uuid, data: ClassData) -> Result<Class, Problem>;
}

impl ClassDbExt for Database {
    async fn classes(&self, query: ClassQuery, page: PageState) -> Result<Vec<Class>, Problem> {
        self.list::<Class>(query.filter(), Some(doc! { "starts_at": -1 }), Some(page))
            .await
    }

    async fn classes_of_student(&self, student: Uuid) -> Result<Vec<Class>, Problem> {
        self.list::<Class>(
            filter::by_student(student),
            Some(doc! { "starts_at": 1 }),
            None,
        )
        .await
    }

    async fn active_classes_between(&self, range: &Interval) -> Result<Vec<Class>, Problem> {
        let active = self
            .list::<Class>(
                doc! { "status": { "$in": [
                    ClassStatus::PendingPayment.as_str(),
                    ClassStatus::Scheduled.as_str(),
                ] } },
                Some(doc! { "starts_at": 1 }),
                None,
            )
            .await?;
        Ok(active
            .into_iter()
            .filter(|it| it.interval().overlaps(range))
            .collect())
    }

    async fn create_class(&self, data: ClassData) -> Result<Class, Problem> {
        data.validate()?;
        if data.status.blocks_schedule() && !data.allow_overlap {
            let interval = data.interval();
            let nearby = self.active_classes_between(&interval).await?;
            if let Some(other) = find_overlap(&nearby, &interval, None) {
                return Err(problem::overlapping(other));
            }
        }

        let class = data.into_class(Uuid::new_v4(), Utc::now());
        self.insert(&class).await?;
        tracing::info!("Created class {} for student {}", class.id, class.student_id);
        Ok(class)
    }

    async fn update_class(&self, id: Uuid, data: ClassData) -> Result<Class, Problem> {
        data.validate()?;
        let existing = self
            .get::<Class>(id)
            .await?
            .ok_or_else(|| problems::not_found("Class", id))?;

        if data.status.blocks_schedule() && !data.allow_overlap {
            let interval = data.interval();
            let nearby = self.active_classes_between(&interval).await?;
            if let Some(other) = find_overlap(&nearby, &interval, Some(id)) {
                return Err(problem::overlapping(other));
            }
        }

        let mut class = data.into_class(id, existing.created_at);
        class.class_request_id = existing.class_request_id;
        self.replace(&class).await?;
        Ok(class)
    }
}
