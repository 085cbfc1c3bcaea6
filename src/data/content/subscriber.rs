use base64::Engine;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, is_duplicate_key, Record, RecordDbExt};
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::util::{base64_engine, is_valid_email, normalize_email};

/// Newsletter subscriber. `email` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Record for Subscriber {
    const COLLECTION: &'static str = "subscribers";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub locale: Option<String>,
}

impl SubscribeRequest {
    pub fn validate(&self) -> Result<(), Problem> {
        if !is_valid_email(self.email.trim()) {
            return Err(bad_field("email", "Not a valid e-mail address."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub success: bool,
    pub already_subscribed: bool,
}

impl SubscribeResponse {
    /// Repeat subscriptions still succeed.
    pub fn after_insert(created: bool) -> SubscribeResponse {
        SubscribeResponse {
            success: true,
            already_subscribed: !created,
        }
    }
}

/// Token proving an unsubscribe link was issued by this site.
pub fn unsubscribe_token(secret: &str, email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(normalize_email(email).as_bytes());
    base64_engine().encode(hasher.finalize())
}

/// Compares every byte so the time taken doesn't depend on where tokens differ.
pub fn verify_unsubscribe_token(secret: &str, email: &str, token: &str) -> bool {
    let expected = unsubscribe_token(secret, email);
    expected.len() == token.len()
        && expected
            .bytes()
            .zip(token.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

pub trait SubscriberDbExt {
    /// Returns `false` when the address was already subscribed.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<bool, Problem>;

    async fn unsubscribe(&self, email: &str) -> Result<bool, Problem>;

    async fn subscribers(&self) -> Result<Vec<Subscriber>, Problem>;
}

impl SubscriberDbExt for Database {
    async fn subscribe(&self, request: SubscribeRequest) -> Result<bool, Problem> {
        request.validate()?;
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: normalize_email(&request.email),
            locale: request.locale,
            created_at: Utc::now(),
        };

        match self.insert(&subscriber).await {
            Ok(()) => {
                tracing::info!("New newsletter subscriber {}", subscriber.id);
                Ok(true)
            }
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool, Problem> {
        let result = self
            .collection::<bson::Document>(Subscriber::COLLECTION)
            .delete_one(filter::by_email(normalize_email(email)), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn subscribers(&self) -> Result<Vec<Subscriber>, Problem> {
        self.list::<Subscriber>(
            bson::doc! {},
            Some(bson::doc! { "created_at": -1 }),
            None,
        )
        .await
    }
}
