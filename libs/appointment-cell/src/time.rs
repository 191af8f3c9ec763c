// libs/appointment-cell/src/time.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeRangeError {
    #[error("start time must be before end time")]
    Inverted,

    #[error("duration must be positive, got {0} minutes")]
    NonPositiveDuration(i64),
}

/// Half-open interval `[start_time, end_time)`.
///
/// Construction guarantees `start_time < end_time`, and the end can only be
/// changed together with the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = TimeRangeError;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::new(raw.start_time, raw.end_time)
    }
}

impl TimeRange {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if start_time >= end_time {
            return Err(TimeRangeError::Inverted);
        }
        Ok(Self { start_time, end_time })
    }

    pub fn from_duration(start_time: DateTime<Utc>, duration_minutes: i64) -> Result<Self, TimeRangeError> {
        if duration_minutes <= 0 {
            return Err(TimeRangeError::NonPositiveDuration(duration_minutes));
        }
        Self::new(start_time, start_time + Duration::minutes(duration_minutes))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Back-to-back ranges (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
    }

    fn range(start: (u32, u32), end: (u32, u32)) -> TimeRange {
        TimeRange::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let pairs = [
            (range((10, 0), (10, 50)), range((10, 30), (11, 0))),
            (range((10, 0), (10, 50)), range((10, 50), (11, 20))),
            (range((9, 0), (12, 0)), range((10, 0), (10, 30))),
            (range((8, 0), (9, 0)), range((13, 0), (14, 0))),
        ];

        for (a, b) in pairs {
            assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }

    #[test]
    fn test_half_open_boundaries_never_conflict() {
        let booked = range((10, 0), (10, 50));

        assert!(booked.overlaps(&range((10, 30), (11, 0))));
        assert!(!booked.overlaps(&range((10, 50), (11, 20))));
        assert!(!booked.overlaps(&range((9, 0), (10, 0))));
        assert!(booked.overlaps(&range((10, 10), (10, 20))));
    }

    #[test]
    fn test_end_is_derived_from_duration() {
        let slot = TimeRange::from_duration(at(10, 0), 50).unwrap();
        assert_eq!(slot.end(), at(10, 50));
        assert_eq!(slot.duration_minutes(), 50);

        assert_eq!(
            TimeRange::from_duration(at(10, 0), 0),
            Err(TimeRangeError::NonPositiveDuration(0))
        );
        assert_eq!(TimeRange::new(at(11, 0), at(10, 0)), Err(TimeRangeError::Inverted));
    }

    #[test]
    fn test_deserialization_validates_order() {
        let ok: TimeRange = serde_json::from_value(json!({
            "start_time": "2030-01-07T10:00:00Z",
            "end_time": "2030-01-07T10:50:00Z"
        }))
        .unwrap();
        assert_eq!(ok.start(), at(10, 0));

        let inverted = serde_json::from_value::<TimeRange>(json!({
            "start_time": "2030-01-07T11:00:00Z",
            "end_time": "2030-01-07T10:00:00Z"
        }));
        assert!(inverted.is_err());
    }
}
