//! Lesson slot computation.
//!
//! Weekly availability is kept as local wall-clock windows in the business time zone.
//! Bookable slots for a range are found by expanding those windows day by day, removing
//! blocked periods and classes that still occupy their time, and cutting what is left
//! into lesson-length slots that start on a fixed step of the local clock.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SubsecRound, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::availability::{AvailabilitySlot, BlockedPeriod};
use crate::data::class::Class;
use crate::error::ConfigurationError;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
        Interval { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    fn clip(&self, bounds: &Interval) -> Option<Interval> {
        let clipped = Interval::new(self.start.max(bounds.start), self.end.min(bounds.end));
        (!clipped.is_empty()).then_some(clipped)
    }
}

/// Sorts and coalesces overlapping or touching intervals.
pub fn merge(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|it| !it.is_empty());
    intervals.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => last.end = last.end.max(interval.end),
            _ => merged.push(interval),
        }
    }
    merged
}

/// Removes every `busy` range from the `free` ranges.
pub fn subtract(free: &[Interval], busy: &[Interval]) -> Vec<Interval> {
    let busy = merge(busy.to_vec());
    let mut result = vec![];

    for interval in merge(free.to_vec()) {
        let mut cursor = interval.start;
        for b in busy.iter().filter(|b| b.overlaps(&interval)) {
            if b.start > cursor {
                result.push(Interval::new(cursor, b.start));
            }
            cursor = cursor.max(b.end);
        }
        if cursor < interval.end {
            result.push(Interval::new(cursor, interval.end));
        }
    }

    result
}

#[derive(Debug, Clone, Copy)]
pub struct SlotRules {
    pub tz: Tz,
    pub step: Duration,
    pub min_notice: Duration,
    pub default_lesson: Duration,
}

impl SlotRules {
    pub fn from_config(config: &Config) -> Result<SlotRules, ConfigurationError> {
        Ok(SlotRules {
            tz: config.business_timezone()?,
            step: Duration::minutes(config.slot_step_minutes as i64),
            min_notice: Duration::hours(config.min_notice_hours as i64),
            default_lesson: Duration::minutes(config.lesson_minutes as i64),
        })
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Concrete availability windows inside `range`.
    pub fn windows(&self, availability: &[AvailabilitySlot], range: &Interval) -> Vec<Interval> {
        let mut windows = vec![];
        let Some(last) = self.local_date(range.end).succ_opt() else {
            return windows;
        };

        let mut date = self.local_date(range.start);
        while date <= last {
            let day = date.weekday().num_days_from_sunday() as u8;
            for slot in availability
                .iter()
                .filter(|it| it.active && it.day_of_week == day)
            {
                let start = self
                    .tz
                    .from_local_datetime(&date.and_time(slot.start_time))
                    .earliest();
                let end = self
                    .tz
                    .from_local_datetime(&date.and_time(slot.end_time))
                    .latest();
                if let (Some(start), Some(end)) = (start, end) {
                    let window = Interval::new(start.with_timezone(&Utc), end.with_timezone(&Utc));
                    if let Some(window) = window.clip(range) {
                        windows.push(window);
                    }
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        merge(windows)
    }

    /// Rounds up to the next multiple of `step` on the local clock.
    fn align(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let mut at_secs = at.trunc_subsecs(0);
        if at_secs < at {
            at_secs = at_secs + Duration::seconds(1);
        }
        let step = self.step.num_seconds().max(1);
        let since_midnight = at_secs
            .with_timezone(&self.tz)
            .num_seconds_from_midnight() as i64;
        match since_midnight % step {
            0 => at_secs,
            rem => at_secs + Duration::seconds(step - rem),
        }
    }

    /// Bookable lesson slots of length `lesson` inside `range`.
    pub fn open_slots(
        &self,
        availability: &[AvailabilitySlot],
        blocked: &[BlockedPeriod],
        classes: &[Class],
        range: &Interval,
        lesson: Duration,
        now: DateTime<Utc>,
    ) -> Vec<Interval> {
        let earliest = now + self.min_notice;
        let busy: Vec<Interval> = blocked
            .iter()
            .map(BlockedPeriod::interval)
            .chain(
                classes
                    .iter()
                    .filter(|it| it.status.blocks_schedule())
                    .map(Class::interval),
            )
            .collect();

        let mut slots = vec![];
        for free in subtract(&self.windows(availability, range), &busy) {
            let mut start = self.align(free.start.max(earliest));
            while start + lesson <= free.end {
                slots.push(Interval::new(start, start + lesson));
                start = start + self.step;
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::tests::class_at;
    use crate::data::class::ClassStatus;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, day, hour, minute, 0).unwrap()
    }

    fn rules(tz: Tz) -> SlotRules {
        SlotRules {
            tz,
            step: Duration::minutes(30),
            min_notice: Duration::hours(24),
            default_lesson: Duration::minutes(60),
        }
    }

    fn weekly(day_of_week: u8, start: (u32, u32), end: (u32, u32)) -> AvailabilitySlot {
        AvailabilitySlot {
            id: Uuid::new_v4(),
            teacher_id: None,
            day_of_week,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            active: true,
        }
    }

    #[test]
    fn merge_coalesces_touching_ranges() {
        let merged = merge(vec![
            Interval::new(at(4, 11, 0), at(4, 12, 0)),
            Interval::new(at(4, 9, 0), at(4, 10, 0)),
            Interval::new(at(4, 10, 0), at(4, 11, 0)),
            Interval::new(at(4, 14, 0), at(4, 14, 0)),
        ]);
        assert_eq!(merged, vec![Interval::new(at(4, 9, 0), at(4, 12, 0))]);
    }

    #[test]
    fn subtract_cuts_holes() {
        let free = [Interval::new(at(4, 9, 0), at(4, 17, 0))];
        let busy = [
            Interval::new(at(4, 10, 0), at(4, 11, 0)),
            Interval::new(at(4, 16, 30), at(4, 18, 0)),
        ];
        assert_eq!(
            subtract(&free, &busy),
            vec![
                Interval::new(at(4, 9, 0), at(4, 10, 0)),
                Interval::new(at(4, 11, 0), at(4, 16, 30)),
            ]
        );
    }

    #[test]
    fn slots_skip_booked_classes() {
        // 2030-03-04 is a Monday.
        let availability = [weekly(1, (9, 0), (12, 0))];
        let booked = class_at(10, 60, ClassStatus::Scheduled);
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        let slots = rules(Tz::UTC).open_slots(
            &availability,
            &[],
            &[booked],
            &range,
            Duration::minutes(60),
            at(1, 0, 0),
        );

        assert_eq!(
            slots,
            vec![Interval::new(at(4, 9, 0), at(4, 10, 0)), Interval::new(at(4, 11, 0), at(4, 12, 0))]
        );
    }

    #[test]
    fn cancelled_classes_free_their_slot() {
        let availability = [weekly(1, (10, 0), (11, 0))];
        let cancelled = class_at(10, 60, ClassStatus::Cancelled);
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        let slots = rules(Tz::UTC).open_slots(
            &availability,
            &[],
            &[cancelled],
            &range,
            Duration::minutes(60),
            at(1, 0, 0),
        );
        assert_eq!(slots, vec![Interval::new(at(4, 10, 0), at(4, 11, 0))]);
    }

    #[test]
    fn minimum_notice_is_respected() {
        let availability = [weekly(1, (9, 0), (12, 0))];
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        // 24h notice from Sunday 10:10 leaves Monday from 10:30 on.
        let slots = rules(Tz::UTC).open_slots(
            &availability,
            &[],
            &[],
            &range,
            Duration::minutes(60),
            at(3, 10, 10),
        );
        assert_eq!(
            slots,
            vec![Interval::new(at(4, 10, 30), at(4, 11, 30)), Interval::new(at(4, 11, 0), at(4, 12, 0))]
        );
    }

    #[test]
    fn blocked_periods_remove_whole_days() {
        let availability = [weekly(1, (9, 0), (12, 0))];
        let blocked = [BlockedPeriod {
            id: Uuid::new_v4(),
            starts_at: at(4, 0, 0),
            ends_at: at(5, 0, 0),
            reason: Some("holiday".to_string()),
        }];
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        let slots = rules(Tz::UTC).open_slots(
            &availability,
            &blocked,
            &[],
            &range,
            Duration::minutes(60),
            at(1, 0, 0),
        );
        assert!(slots.is_empty());
    }

    #[test]
    fn windows_follow_business_timezone() {
        // Madrid is UTC+1 in early March.
        let availability = [weekly(1, (9, 0), (10, 0))];
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        let windows = rules(chrono_tz::Europe::Madrid).windows(&availability, &range);
        assert_eq!(windows, vec![Interval::new(at(4, 8, 0), at(4, 9, 0))]);
    }

    #[test]
    fn inactive_availability_is_ignored() {
        let mut slot = weekly(1, (9, 0), (10, 0));
        slot.active = false;
        let range = Interval::new(at(4, 0, 0), at(5, 0, 0));

        assert!(rules(Tz::UTC).windows(&[slot], &range).is_empty());
    }
}
