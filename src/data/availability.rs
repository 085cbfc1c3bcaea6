use bson::doc;
use chrono::{DateTime, NaiveTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Record, RecordDbExt};
use crate::resp::problem::problems::bad_field;
use crate::resp::problem::Problem;
use crate::schedule::Interval;

/// Recurring weekly window in the business time zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilitySlot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    /// 0 = Sunday, 6 = Saturday.
    pub day_of_week: u8,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "13:00:00")]
    pub end_time: NaiveTime,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Record for AvailabilitySlot {
    const COLLECTION: &'static str = "availability";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl AvailabilitySlot {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.day_of_week > 6 {
            return Err(bad_field(
                "day_of_week",
                "Day of week must be between 0 (Sunday) and 6 (Saturday).",
            ));
        }
        if self.end_time <= self.start_time {
            return Err(bad_field("end_time", "End time must be after start time."));
        }
        Ok(())
    }
}

/// Period in which no lessons can be booked (holidays, sick days).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlockedPeriod {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Record for BlockedPeriod {
    const COLLECTION: &'static str = "blocked_periods";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl BlockedPeriod {
    pub fn interval(&self) -> Interval {
        Interval::new(self.starts_at, self.ends_at)
    }

    pub fn validate(&self) -> Result<(), Problem> {
        if self.ends_at <= self.starts_at {
            return Err(bad_field("ends_at", "Blocked period must end after it starts."));
        }
        Ok(())
    }
}

pub trait AvailabilityDbExt {
    async fn availability(&self) -> Result<Vec<AvailabilitySlot>, Problem>;

    async fn blocked_periods(&self) -> Result<Vec<BlockedPeriod>, Problem>;

    async fn blocked_between(&self, range: &Interval) -> Result<Vec<BlockedPeriod>, Problem>;
}

impl AvailabilityDbExt for Database {
    async fn availability(&self) -> Result<Vec<AvailabilitySlot>, Problem> {
        self.list::<AvailabilitySlot>(
            doc! {},
            Some(doc! { "day_of_week": 1, "start_time": 1 }),
            None,
        )
        .await
    }

    async fn blocked_periods(&self) -> Result<Vec<BlockedPeriod>, Problem> {
        self.list::<BlockedPeriod>(doc! {}, Some(doc! { "starts_at": 1 }), None)
            .await
    }

    async fn blocked_between(&self, range: &Interval) -> Result<Vec<BlockedPeriod>, Problem> {
        // Few documents; range filtering on serialized timestamps is done here.
        let all = self.blocked_periods().await?;
        Ok(all
            .into_iter()
            .filter(|it| it.interval().overlaps(range))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_validation() {
        let mut slot = AvailabilitySlot {
            id: Uuid::new_v4(),
            teacher_id: None,
            day_of_week: 7,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            active: true,
        };
        assert!(slot.validate().is_err());

        slot.day_of_week = 2;
        assert!(slot.validate().is_ok());

        slot.end_time = slot.start_time;
        assert!(slot.validate().is_err());
    }

    #[test]
    fn slot_times_read_as_wall_clock_strings() {
        let slot: AvailabilitySlot = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "day_of_week": 3,
            "start_time": "09:30:00",
            "end_time": "11:00:00"
        }))
        .expect("valid slot json");

        assert!(slot.active);
        assert_eq!(slot.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }
}
