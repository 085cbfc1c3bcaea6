//! Collection-scoped access to the managed document store.
//!
//! Every record is stored as a plain document with a string `id` field; the store's own
//! `_id` is never exposed. Reads and writes go through [`RecordDbExt`], which entity
//! modules extend with their own queries.

use bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;

pub mod availability;
pub mod class;
pub mod class_request;
pub mod content;
pub mod homework;
pub mod payment;
pub mod user;

pub mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "id": id.to_string() }
    }

    #[inline]
    pub fn by_student(student: Uuid) -> Document {
        doc! { "student_id": student.to_string() }
    }

    #[inline]
    pub fn by_email(email: impl AsRef<str>) -> Document {
        doc! { "email": email.as_ref() }
    }
}

/// A document kept in its own collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// Mongo write error code for unique index violations.
const DUPLICATE_KEY: i32 = 11000;

pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

pub trait RecordDbExt {
    async fn list<R: Record>(
        &self,
        filter: Document,
        sort: Option<Document>,
        page: Option<PageState>,
    ) -> Result<Vec<R>, Problem>;

    async fn get<R: Record>(&self, id: Uuid) -> Result<Option<R>, Problem>;

    async fn find_one_by<R: Record>(&self, filter: Document) -> Result<Option<R>, Problem>;

    async fn insert<R: Record>(&self, record: &R) -> Result<(), mongodb::error::Error>;

    /// Whole-record update. Returns whether a record with that id existed.
    async fn replace<R: Record>(&self, record: &R) -> Result<bool, Problem>;

    async fn upsert<R: Record>(&self, record: &R) -> Result<(), Problem>;

    async fn remove<R: Record>(&self, id: Uuid) -> Result<bool, Problem>;

    async fn count<R: Record>(&self, filter: Document) -> Result<u64, Problem>;
}

impl RecordDbExt for Database {
    async fn list<R: Record>(
        &self,
        filter: Document,
        sort: Option<Document>,
        page: Option<PageState>,
    ) -> Result<Vec<R>, Problem> {
        let mut options = FindOptions::builder().sort(sort).build();
        if let Some(page) = page {
            options.skip = Some(page.skip());
            options.limit = Some(page.page_length as i64);
        }

        let mut cursor = self
            .collection::<Document>(R::COLLECTION)
            .find(filter, options)
            .await?;

        let mut records = vec![];
        while let Some(document) = cursor.try_next().await? {
            match bson::from_document::<R>(document) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("unable to deserialize {} document: {}", R::COLLECTION, e)
                }
            }
        }

        Ok(records)
    }

    async fn get<R: Record>(&self, id: Uuid) -> Result<Option<R>, Problem> {
        self.find_one_by(filter::by_id(id)).await
    }

    async fn find_one_by<R: Record>(&self, filter: Document) -> Result<Option<R>, Problem> {
        let document = self
            .collection::<Document>(R::COLLECTION)
            .find_one(filter, None)
            .await?;

        match document {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn insert<R: Record>(&self, record: &R) -> Result<(), mongodb::error::Error> {
        let document = bson::to_document(record)?;
        self.collection::<Document>(R::COLLECTION)
            .insert_one(document, None)
            .await?;
        Ok(())
    }

    async fn replace<R: Record>(&self, record: &R) -> Result<bool, Problem> {
        let document = bson::to_document(record)?;
        let result = self
            .collection::<Document>(R::COLLECTION)
            .replace_one(filter::by_id(record.id()), document, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn upsert<R: Record>(&self, record: &R) -> Result<(), Problem> {
        let document = bson::to_document(record)?;
        self.collection::<Document>(R::COLLECTION)
            .replace_one(
                filter::by_id(record.id()),
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn remove<R: Record>(&self, id: Uuid) -> Result<bool, Problem> {
        let result = self
            .collection::<Document>(R::COLLECTION)
            .delete_one(filter::by_id(id), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count<R: Record>(&self, filter: Document) -> Result<u64, Problem> {
        Ok(self
            .collection::<Document>(R::COLLECTION)
            .count_documents(filter, None)
            .await?)
    }
}

async fn unique_index(db: &Database, collection: &str, key: &str) -> mongodb::error::Result<()> {
    let model = IndexModel::builder()
        .keys(doc! { key: 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<Document>(collection)
        .create_index(model, None)
        .await?;
    Ok(())
}

/// Creates the indexes the service relies on. Safe to run on every start.
pub async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    for collection in [
        user::User::COLLECTION,
        class::Class::COLLECTION,
        class_request::ClassRequest::COLLECTION,
        homework::Homework::COLLECTION,
        payment::PaymentNotification::COLLECTION,
        availability::AvailabilitySlot::COLLECTION,
        availability::BlockedPeriod::COLLECTION,
        content::blog::BlogPost::COLLECTION,
        content::contact::ContactMessage::COLLECTION,
        content::review::Review::COLLECTION,
        content::subscriber::Subscriber::COLLECTION,
    ] {
        unique_index(db, collection, "id").await?;
    }
    unique_index(db, content::subscriber::Subscriber::COLLECTION, "email").await?;
    unique_index(db, content::setting::Setting::COLLECTION, "key").await?;
    Ok(())
}
