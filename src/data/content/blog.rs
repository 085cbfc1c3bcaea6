use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{Record, RecordDbExt};
use crate::middleware::paging::PageState;
use crate::resp::problem::problems::{self, bad_field};
use crate::resp::problem::Problem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    /// Markdown source.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for BlogPost {
    const COLLECTION: &'static str = "blog_posts";

    fn id(&self) -> Uuid {
        self.id
    }
}

lazy_static! {
    static ref SLUG_PATTERN: Regex =
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern must compile");
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlogPostData {
    pub slug: String,
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

impl BlogPostData {
    pub fn validate(&self) -> Result<(), Problem> {
        if !SLUG_PATTERN.is_match(&self.slug) {
            return Err(bad_field(
                "slug",
                "Slug may only hold lowercase letters, digits and single dashes.",
            ));
        }
        if self.title.trim().is_empty() {
            return Err(bad_field("title", "Post needs a title."));
        }
        if self.locale.trim().is_empty() {
            return Err(bad_field("locale", "Post needs a locale."));
        }
        Ok(())
    }

    pub fn into_post(self, id: Uuid, existing: Option<&BlogPost>) -> BlogPost {
        let now = Utc::now();
        // First publication date sticks across edits.
        let published_at = match (self.published, existing.and_then(|it| it.published_at)) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now),
            (false, at) => at,
        };
        BlogPost {
            id,
            slug: self.slug,
            locale: self.locale,
            title: self.title,
            excerpt: self.excerpt,
            body: self.body,
            cover_url: self.cover_url,
            tags: self.tags,
            published: self.published,
            published_at,
            created_at: existing.map(|it| it.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

pub mod problem {
    use crate::resp::problem::{problems, Problem};

    #[inline]
    pub fn slug_taken(slug: &str, locale: &str) -> Problem {
        problems::conflict("A post with this slug already exists.")
            .insert_str("slug", slug)
            .insert_str("locale", locale)
            .to_owned()
    }
}

pub trait BlogDbExt {
    async fn published_posts(
        &self,
        locale: Option<&str>,
        page: PageState,
    ) -> Result<Vec<BlogPost>, Problem>;

    async fn published_post(&self, slug: &str, locale: Option<&str>)
        -> Result<Option<BlogPost>, Problem>;

    async fn all_posts(&self, page: PageState) -> Result<Vec<BlogPost>, Problem>;

    async fn save_post(&self, id: Option<Uuid>, data: BlogPostData) -> Result<BlogPost, Problem>;
}

impl BlogDbExt for Database {
    async fn published_posts(
        &self,
        locale: Option<&str>,
        page: PageState,
    ) -> Result<Vec<BlogPost>, Problem> {
        let mut filter = doc! { "published": true };
        if let Some(locale) = locale {
            filter.insert("locale", locale);
        }
        self.list::<BlogPost>(filter, Some(doc! { "published_at": -1 }), Some(page))
            .await
    }

    async fn published_post(
        &self,
        slug: &str,
        locale: Option<&str>,
    ) -> Result<Option<BlogPost>, Problem> {
        let mut filter = doc! { "slug": slug, "published": true };
        if let Some(locale) = locale {
            filter.insert("locale", locale);
        }
        self.find_one_by::<BlogPost>(filter).await
    }

    async fn all_posts(&self, page: PageState) -> Result<Vec<BlogPost>, Problem> {
        self.list::<BlogPost>(doc! {}, Some(doc! { "created_at": -1 }), Some(page))
            .await
    }

    /// Creates a post when `id` is `None`, otherwise replaces the existing one.
    async fn save_post(&self, id: Option<Uuid>, data: BlogPostData) -> Result<BlogPost, Problem> {
        data.validate()?;

        let clash = self
            .find_one_by::<BlogPost>(doc! { "slug": &data.slug, "locale": &data.locale })
            .await?;
        if let Some(clash) = clash {
            if Some(clash.id) != id {
                return Err(problem::slug_taken(&data.slug, &data.locale));
            }
        }

        match id {
            None => {
                let post = data.into_post(Uuid::new_v4(), None);
                self.insert(&post).await?;
                tracing::info!("Created blog post '{}' ({})", post.slug, post.locale);
                Ok(post)
            }
            Some(id) => {
                let existing = self
                    .get::<BlogPost>(id)
                    .await?
                    .ok_or_else(|| problems::not_found("Blog post", id))?;
                let post = data.into_post(id, Some(&existing));
                self.replace(&post).await?;
                Ok(post)
            }
        }
    }
}
