use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use super::{AttendanceStore, StoreError};
use crate::model::onsite::{ActiveRecord, DayWindow, OnsiteRecord};
use crate::model::staff::{Assignment, Staff};
use crate::retry::{self, RetryPolicy};

pub struct MySqlStore {
    pool: MySqlPool,
    retry: RetryPolicy,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn staff_roster(&self) -> Result<Vec<Staff>, StoreError> {
        let staff = retry::run(&self.retry, "select staff roster", || async move {
            sqlx::query_as::<_, Staff>("SELECT tag_id, Name, department FROM Staff")
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await?;

        debug!(count = staff.len(), "Loaded staff roster");
        Ok(staff)
    }

    async fn staff_by_tag(&self, tag_id: &str) -> Result<Option<Staff>, StoreError> {
        retry::run(&self.retry, "select staff by tag", || async move {
            sqlx::query_as::<_, Staff>(
                "SELECT tag_id, Name, department FROM Staff WHERE tag_id = ?",
            )
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn assignment_by_tag(&self, tag_id: &str) -> Result<Option<Assignment>, StoreError> {
        retry::run(&self.retry, "select assignment", || async move {
            sqlx::query_as::<_, Assignment>("SELECT tag_id, Name FROM sign WHERE tag_id = ?")
                .bind(tag_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_assignment(&self, tag_id: &str, name: &str) -> Result<(), StoreError> {
        retry::run(&self.retry, "insert assignment", || async move {
            sqlx::query("INSERT INTO sign (tag_id, Name) VALUES (?, ?)")
                .bind(tag_id)
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await?;

        info!(tag_id, name, "Assigned tag in sign table");
        Ok(())
    }

    async fn latest_record(
        &self,
        tag_id: &str,
        day: &DayWindow,
    ) -> Result<Option<OnsiteRecord>, StoreError> {
        retry::run(&self.retry, "select latest onsite record", || async move {
            sqlx::query_as::<_, OnsiteRecord>(
                r#"
                SELECT onsite_id, tag_id, scan_date, Active, sign_out_date
                FROM onsite
                WHERE tag_id = ? AND scan_date >= ? AND scan_date < ?
                ORDER BY scan_date DESC, onsite_id DESC
                LIMIT 1
                "#,
            )
            .bind(tag_id)
            .bind(day.start)
            .bind(day.end)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn open_record(&self, tag_id: &str, at: NaiveDateTime) -> Result<u64, StoreError> {
        let result = retry::run(&self.retry, "insert onsite record", || async move {
            sqlx::query(
                r#"
                INSERT INTO onsite (tag_id, scan_date, Active, sign_out_date)
                VALUES (?, ?, 1, NULL)
                "#,
            )
            .bind(tag_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await?;

        let id = result.last_insert_id();
        info!(tag_id, onsite_id = id, %at, "Marked IN in onsite ledger");
        Ok(id)
    }

    async fn close_record(&self, record_id: u64, at: NaiveDateTime) -> Result<(), StoreError> {
        retry::run(&self.retry, "close onsite record", || async move {
            sqlx::query("UPDATE onsite SET Active = 0, sign_out_date = ? WHERE onsite_id = ?")
                .bind(at)
                .bind(record_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await?;

        info!(onsite_id = record_id, %at, "Marked OUT in onsite ledger");
        Ok(())
    }

    async fn active_records(&self, day: &DayWindow) -> Result<Vec<ActiveRecord>, StoreError> {
        retry::run(&self.retry, "select active onsite records", || async move {
            sqlx::query_as::<_, ActiveRecord>(
                r#"
                SELECT o.onsite_id, o.tag_id, s.Name
                FROM onsite o
                LEFT JOIN Staff s ON s.tag_id = o.tag_id
                WHERE o.Active = 1 AND o.scan_date >= ? AND o.scan_date < ?
                ORDER BY o.scan_date
                "#,
            )
            .bind(day.start)
            .bind(day.end)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn close_records(&self, record_ids: &[u64], at: NaiveDateTime) -> Result<(), StoreError> {
        let mut tx = retry::run(&self.retry, "begin sweep transaction", || async move {
            self.pool.begin().await.map_err(StoreError::from)
        })
        .await?;

        for id in record_ids {
            let result = sqlx::query(
                "UPDATE onsite SET Active = 0, sign_out_date = ? WHERE onsite_id = ?",
            )
            .bind(at)
            .bind(*id)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                error!(error = %e, onsite_id = id, "Sweep update failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "Rollback of sweep transaction failed");
                }
                return Err(e.into());
            }
        }

        tx.commit().await?;
        info!(count = record_ids.len(), "Committed end-of-day sign-outs");
        Ok(())
    }
}
