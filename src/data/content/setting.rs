use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::class::{default_currency, normalize_currency};
use crate::data::{Record, RecordDbExt};
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;

/// Key of the setting holding the plans shown on the pricing page.
pub const PRICING_KEY: &str = "pricing";

/// Free-form site configuration value, addressed by `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Setting {
    /// Derived from `key`.
    pub id: Uuid,
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Setting {
    const COLLECTION: &'static str = "settings";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Setting {
    pub fn id_for(key: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }

    pub fn new(key: impl ToString, value: Value) -> Setting {
        let key = key.to_string();
        Setting {
            id: Setting::id_for(&key),
            key,
            value,
            updated_at: Utc::now(),
        }
    }
}

pub fn validate_key(key: &str) -> Result<(), Problem> {
    let valid = !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c));
    if !valid {
        return Err(bad_field(
            "key",
            "Setting keys are up to 64 lowercase letters, digits, '_', '.' or '-'.",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricePlan {
    pub name: String,
    /// Minor currency units.
    pub price: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_plan_lessons")]
    pub lessons: u32,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub highlighted: bool,
}

fn default_plan_lessons() -> u32 {
    1
}

/// Parses a pricing value and returns it with currencies upper-cased.
pub fn normalize_price_plans(value: Value) -> Result<Value, Problem> {
    let mut plans: Vec<PricePlan> = serde_json::from_value(value)
        .map_err(|e| bad_field("value", format!("Invalid price plans: {}", e)))?;
    for plan in &mut plans {
        if plan.price < 0 {
            return Err(bad_field("value", "Plan prices can't be negative."));
        }
        plan.currency = normalize_currency("value", &plan.currency)?;
    }
    Ok(serde_json::to_value(plans)?)
}

pub trait SettingDbExt {
    async fn setting(&self, key: &str) -> Result<Option<Setting>, Problem>;

    async fn all_settings(&self) -> Result<Vec<Setting>, Problem>;

    async fn put_setting(&self, key: &str, value: Value) -> Result<Setting, Problem>;

    async fn remove_setting(&self, key: &str) -> Result<bool, Problem>;

    /// Plans stored under [`PRICING_KEY`]; empty when unset.
    async fn price_plans(&self) -> Result<Vec<PricePlan>, Problem>;
}

impl SettingDbExt for Database {
    async fn setting(&self, key: &str) -> Result<Option<Setting>, Problem> {
        self.find_one_by::<Setting>(doc! { "key": key }).await
    }

    async fn all_settings(&self) -> Result<Vec<Setting>, Problem> {
        self.list::<Setting>(doc! {}, Some(doc! { "key": 1 }), None)
            .await
    }

    async fn put_setting(&self, key: &str, value: Value) -> Result<Setting, Problem> {
        validate_key(key)?;
        let value = if key == PRICING_KEY {
            normalize_price_plans(value)?
        } else {
            value
        };

        let setting = Setting::new(key, value);
        self.upsert(&setting).await?;
        tracing::info!("Updated setting '{}'", key);
        Ok(setting)
    }

    async fn remove_setting(&self, key: &str) -> Result<bool, Problem> {
        self.remove::<Setting>(Setting::id_for(key)).await
    }

    async fn price_plans(&self) -> Result<Vec<PricePlan>, Problem> {
        match self.setting(PRICING_KEY).await? {
            Some(setting) => Ok(serde_json::from_value(setting.value)?),
            None => Ok(vec![]),
        }
    }
}
