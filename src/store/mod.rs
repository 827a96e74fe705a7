//! Attendance ledger: staff roster, tag assignments and the `onsite` in/out records.

mod mysql;

pub use mysql::MySqlStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::onsite::{ActiveRecord, DayWindow, OnsiteRecord};
use crate::model::staff::{Assignment, Staff};
use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => is_transient_sqlx(e),
        }
    }
}

/// Connection-class failures; constraint violations and bad SQL are not retried.
pub fn is_transient_sqlx(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Every staff member, in table order.
    async fn staff_roster(&self) -> Result<Vec<Staff>, StoreError>;

    async fn staff_by_tag(&self, tag_id: &str) -> Result<Option<Staff>, StoreError>;

    async fn assignment_by_tag(&self, tag_id: &str) -> Result<Option<Assignment>, StoreError>;

    async fn insert_assignment(&self, tag_id: &str, name: &str) -> Result<(), StoreError>;

    /// Most recent record for `tag_id` whose scan time falls inside `day`.
    async fn latest_record(
        &self,
        tag_id: &str,
        day: &DayWindow,
    ) -> Result<Option<OnsiteRecord>, StoreError>;

    /// Inserts an active sign-in record and returns its id.
    async fn open_record(&self, tag_id: &str, at: NaiveDateTime) -> Result<u64, StoreError>;

    async fn close_record(&self, record_id: u64, at: NaiveDateTime) -> Result<(), StoreError>;

    async fn active_records(&self, day: &DayWindow) -> Result<Vec<ActiveRecord>, StoreError>;

    /// Closes all given records in one transaction; on error none of them change.
    async fn close_records(&self, record_ids: &[u64], at: NaiveDateTime) -> Result<(), StoreError>;
}
