//! Attendance rules: who scanned, whether the tap counts, and which way it flips.

pub mod identity;
pub mod policy;
pub mod processor;
pub mod sweeper;

use std::time::Duration;

use chrono::NaiveTime;
use thiserror::Error;

use crate::store::StoreError;

/// Why a scan produced no ledger change. None of these fail the process.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("tag '{0}' is not assigned and not in the staff list")]
    UnknownTag(String),

    #[error("tag '{0}' is assigned in sign but missing from Staff")]
    InconsistentAssignment(String),

    #[error("{name} tapped again too soon, wait {remaining:?}")]
    Cooldown { name: String, remaining: Duration },

    #[error("{name} scanned at {at}, outside the allowed sign-in window")]
    OutsideWindow { name: String, at: NaiveTime },

    #[error("ledger write failed: {0}")]
    Persistence(#[from] StoreError),
}
