use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{Record, RecordDbExt};
use crate::resp::problem::problems::{self, bad_field};
use crate::resp::problem::Problem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub author_name: String,
    /// 1 to 5 stars.
    pub rating: u8,
    pub text: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Record for Review {
    const COLLECTION: &'static str = "reviews";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewReview {
    pub author_name: String,
    pub rating: u8,
    pub text: String,
    #[serde(default)]
    pub locale: Option<String>,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.author_name.trim().is_empty() {
            return Err(bad_field("author_name", "Review needs an author."));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(bad_field("rating", "Rating must be between 1 and 5."));
        }
        if self.text.trim().is_empty() {
            return Err(bad_field("text", "Review text can't be empty."));
        }
        Ok(())
    }

    /// Submitted reviews wait for staff approval before they are shown.
    pub fn into_review(self) -> Review {
        Review {
            id: Uuid::new_v4(),
            author_name: self.author_name.trim().to_string(),
            rating: self.rating,
            text: self.text.trim().to_string(),
            locale: self.locale,
            approved: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewApproval {
    pub approved: bool,
}

pub trait ReviewDbExt {
    async fn approved_reviews(&self, locale: Option<&str>) -> Result<Vec<Review>, Problem>;

    async fn all_reviews(&self) -> Result<Vec<Review>, Problem>;

    async fn set_approved(&self, id: Uuid, approved: bool) -> Result<Review, Problem>;
}

impl ReviewDbExt for Database {
    async fn approved_reviews(&self, locale: Option<&str>) -> Result<Vec<Review>, Problem> {
        let mut filter = doc! { "approved": true };
        if let Some(locale) = locale {
            filter.insert("locale", locale);
        }
        self.list::<Review>(filter, Some(doc! { "created_at": -1 }), None)
            .await
    }

    async fn all_reviews(&self) -> Result<Vec<Review>, Problem> {
        self.list::<Review>(doc! {}, Some(doc! { "created_at": -1 }), None)
            .await
    }

    async fn set_approved(&self, id: Uuid, approved: bool) -> Result<Review, Problem> {
        let mut review = self
            .get::<Review>(id)
            .await?
            .ok_or_else(|| problems::not_found("Review", id))?;
        review.approved = approved;
        self.replace(&review).await?;
        Ok(review)
    }
}
