use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OnsiteRecord {
    #[sqlx(rename = "onsite_id")]
    pub id: u64,
    pub tag_id: String,
    pub scan_date: NaiveDateTime,
    /// true while signed in
    #[sqlx(rename = "Active")]
    pub active: bool,
    pub sign_out_date: Option<NaiveDateTime>,
}

/// Still-open record found by the end-of-day sweep, with the owner's name when `Staff` knows the tag.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ActiveRecord {
    #[sqlx(rename = "onsite_id")]
    pub id: u64,
    pub tag_id: String,
    #[sqlx(rename = "Name")]
    pub name: Option<String>,
}

/// Half-open interval `[start, end)` covering one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}
