use bson::{doc, Document};
use mongodb::Database;
use uuid::Uuid;

use super::{Homework, HomeworkData, HomeworkReview, HomeworkStatus, HomeworkSubmission};
use crate::data::{filter, RecordDbExt};
use crate::middleware::paging::PageState;
use crate::resp::problem::problems;
use crate::resp::problem::Problem;

#[derive(Debug, Clone, Default)]
pub struct HomeworkQuery {
    pub status: Option<HomeworkStatus>,
    pub student: Option<Uuid>,
}

impl HomeworkQuery {
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

pub trait HomeworkDbExt {
    async fn homework(&self, query: HomeworkQuery, page: PageState)
        -> Result<Vec<Homework>, Problem>;

    async fn homework_of_student(&self, student: Uuid) -> Result<Vec<Homework>, Problem>;

    async fn create_homework(&self, data: HomeworkData) -> Result<Homework, Problem>;

    async fn update_homework(&self, id: Uuid, data: HomeworkData) -> Result<Homework, Problem>;

    /// Student hands in their own homework.
    async fn submit_homework(
        &self,
        student: Uuid,
        id: Uuid,
        submission: HomeworkSubmission,
    ) -> Result<Homework, Problem>;

    async fn review_homework(&self, id: Uuid, review: HomeworkReview)
        -> Result<Homework, Problem>;
}

impl HomeworkDbExt for Database {
    async fn homework(
        &self,
        query: HomeworkQuery,
        page: PageState,
    ) -> Result<Vec<Homework>, Problem> {
        self.list::<Homework>(query.filter(), Some(doc! { "due_date": -1 }), Some(page))
            .await
    }

    async fn homework_of_student(&self, student: Uuid) -> Result<Vec<Homework>, Problem> {
        self.list::<Homework>(
            filter::by_student(student),
            Some(doc! { "due_date": 1 }),
            None,
        )
        .await
    }

    async fn create_homework(&self, data: HomeworkData) -> Result<Homework, Problem> {
        data.validate()?;
        let homework = data.into_homework(Uuid::new_v4(), None);
        self.insert(&homework).await?;
        tracing::info!(
            "Assigned homework {} to student {}",
            homework.id,
            homework.student_id
        );
        Ok(homework)
    }

    async fn update_homework(&self, id: Uuid, data: HomeworkData) -> Result<Homework, Problem> {
        data.validate()?;
        let existing = self
            .get::<Homework>(id)
            .await?
            .ok_or_else(|| problems::not_found("Homework", id))?;
        let homework = data.into_homework(id, Some(&existing));
        self.replace(&homework).await?;
        Ok(homework)
    }

    async fn submit_homework(
        &self,
        student: Uuid,
        id: Uuid,
        submission: HomeworkSubmission,
    ) -> Result<Homework, Problem> {
        submission.validate()?;
        let mut homework = self
            .get::<Homework>(id)
            .await?
            .filter(|it| it.student_id == student)
            .ok_or_else(|| problems::not_found("Homework", id))?;
        homework.submit(submission)?;
        self.replace(&homework).await?;
        Ok(homework)
    }

    async fn review_homework(
        &self,
        id: Uuid,
        review: HomeworkReview,
    ) -> Result<Homework, Problem> {
        let mut homework = self
            .get::<Homework>(id)
            .await?
            .ok_or_else(|| problems::not_found("Homework", id))?;
        homework.review(review);
        self.replace(&homework).await?;
        Ok(homework)
    }
}
