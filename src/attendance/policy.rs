use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};

use crate::model::mark::MonthlyMark;

/// Time-of-day rules applied to every scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendancePolicy {
    pub signin_allowed: NaiveTime,
    pub late_signin: NaiveTime,
    pub cutoff: NaiveTime,
    pub cooldown: Duration,
}

impl AttendancePolicy {
    /// Both ends inclusive.
    pub fn is_within_window(&self, at: NaiveTime) -> bool {
        self.signin_allowed <= at && at <= self.cutoff
    }

    pub fn is_after_cutoff(&self, at: NaiveTime) -> bool {
        at > self.cutoff
    }

    pub fn sign_in_mark(&self, at: NaiveTime) -> MonthlyMark {
        if at > self.late_signin {
            MonthlyMark::PresentLate
        } else {
            MonthlyMark::Present
        }
    }
}

/// Last accepted scan per staff member, kept for this process only.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    last_accepted: HashMap<String, NaiveDateTime>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time still to wait before `name` may scan again, if any.
    pub fn remaining(&self, name: &str, now: NaiveDateTime, cooldown: Duration) -> Option<Duration> {
        let last = self.last_accepted.get(name)?;
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    pub fn record(&mut self, name: &str, at: NaiveDateTime) {
        self.last_accepted.insert(name.to_string(), at);
    }
}
