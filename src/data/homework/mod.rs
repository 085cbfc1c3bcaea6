use chrono::{DateTime, Utc};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Record;
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;

pub mod db;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum HomeworkStatus {
    #[default]
    #[field(value = "assigned")]
    Assigned,
    #[field(value = "submitted")]
    Submitted,
    #[field(value = "reviewed")]
    Reviewed,
    #[field(value = "completed")]
    Completed,
}

impl HomeworkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HomeworkStatus::Assigned => "assigned",
            HomeworkStatus::Submitted => "submitted",
            HomeworkStatus::Reviewed => "reviewed",
            HomeworkStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Homework {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Link to a file kept in external storage.
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: HomeworkStatus,
    #[serde(default)]
    pub submission_text: Option<String>,
    #[serde(default)]
    pub submission_url: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Homework {
    const COLLECTION: &'static str = "homework";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Homework {
    /// Still waiting on the student after its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == HomeworkStatus::Assigned && self.due_date < now
    }

    pub fn submit(&mut self, submission: HomeworkSubmission) -> Result<(), Problem> {
        submission.validate()?;
        let now = Utc::now();
        self.submission_text = submission.text;
        self.submission_url = submission.url;
        self.submitted_at = Some(now);
        self.status = HomeworkStatus::Submitted;
        self.updated_at = now;
        Ok(())
    }

    pub fn review(&mut self, review: HomeworkReview) {
        let now = Utc::now();
        self.grade = review.grade;
        self.feedback = review.feedback;
        self.reviewed_at = Some(now);
        self.status = if review.completed {
            HomeworkStatus::Completed
        } else {
            HomeworkStatus::Reviewed
        };
        self.updated_at = now;
    }
}

/// Body of homework create and whole-record update requests.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HomeworkData {
    pub student_id: Uuid,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: HomeworkStatus,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl HomeworkData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.title.trim().is_empty() {
            return Err(bad_field("title", "Homework needs a title."));
        }
        Ok(())
    }

    /// Applies the edit on top of `existing`, keeping what the student submitted.
    pub fn into_homework(self, id: Uuid, existing: Option<&Homework>) -> Homework {
        let now = Utc::now();
        Homework {
            id,
            student_id: self.student_id,
            class_id: self.class_id,
            title: self.title,
            description: self.description,
            attachment_url: self.attachment_url,
            due_date: self.due_date,
            status: self.status,
            submission_text: existing.and_then(|it| it.submission_text.clone()),
            submission_url: existing.and_then(|it| it.submission_url.clone()),
            submitted_at: existing.and_then(|it| it.submitted_at),
            grade: self.grade,
            feedback: self.feedback,
            reviewed_at: existing.and_then(|it| it.reviewed_at),
            created_at: existing.map(|it| it.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HomeworkSubmission {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl HomeworkSubmission {
    pub fn validate(&self) -> Result<(), Problem> {
        let blank = |it: &Option<String>| it.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.text) && blank(&self.url) {
            return Err(bad_field("text", "Submission needs an answer or a file link."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HomeworkReview {
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    /// Close the homework instead of leaving it reviewed.
    #[serde(default)]
    pub completed: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub fn homework_due(due_date: DateTime<Utc>, status: HomeworkStatus) -> Homework {
        HomeworkData {
            student_id: Uuid::new_v4(),
            class_id: None,
            title: "Irregular verbs".to_string(),
            description: String::new(),
            attachment_url: None,
            due_date,
            status,
            grade: None,
            feedback: None,
        }
        .into_homework(Uuid::new_v4(), None)
    }

    #[test]
    fn only_assigned_homework_goes_overdue() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);

        assert!(homework_due(yesterday, HomeworkStatus::Assigned).is_overdue(now));
        assert!(!homework_due(yesterday, HomeworkStatus::Submitted).is_overdue(now));
        assert!(!homework_due(now + Duration::days(1), HomeworkStatus::Assigned).is_overdue(now));
    }

    #[test]
    fn submission_requires_content() {
        let mut homework = homework_due(Utc::now(), HomeworkStatus::Assigned);
        assert!(homework
            .submit(HomeworkSubmission {
                text: Some("  ".to_string()),
                url: None,
            })
            .is_err());
        assert_eq!(homework.status, HomeworkStatus::Assigned);

        homework
            .submit(HomeworkSubmission {
                text: Some("I went, I saw".to_string()),
                url: None,
            })
            .expect("valid submission");
        assert_eq!(homework.status, HomeworkStatus::Submitted);
        assert!(homework.submitted_at.is_some());
    }

    #[test]
    fn review_sets_grade_and_status() {
        let mut homework = homework_due(Utc::now(), HomeworkStatus::Submitted);
        homework.review(HomeworkReview {
            grade: Some("A".to_string()),
            feedback: Some("Well done".to_string()),
            completed: false,
        });
        assert_eq!(homework.status, HomeworkStatus::Reviewed);
        assert_eq!(homework.grade.as_deref(), Some("A"));

        homework.review(HomeworkReview {
            completed: true,
            ..Default::default()
        });
        assert_eq!(homework.status, HomeworkStatus::Completed);
    }

    #[test]
    fn edits_keep_the_submission() {
        let mut existing = homework_due(Utc::now(), HomeworkStatus::Assigned);
        existing
            .submit(HomeworkSubmission {
                text: Some("answer".to_string()),
                url: None,
            })
            .unwrap();

        let edit = HomeworkData {
            student_id: existing.student_id,
            class_id: None,
            title: "Irregular verbs (2)".to_string(),
            description: String::new(),
            attachment_url: None,
            due_date: existing.due_date,
            status: HomeworkStatus::Submitted,
            grade: None,
            feedback: None,
        };
        let updated = edit.into_homework(existing.id, Some(&existing));
        assert_eq!(updated.submission_text.as_deref(), Some("answer"));
        assert_eq!(updated.created_at, existing.created_at);
    }
}
