use crate::db::Database;
use crate::types::Result;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Database-wide pass lease, shared by every process using the same file.
///
/// Acquisition is one conditional `UPDATE`, so two processes can never both
/// hold it. A lease older than its ttl is treated as abandoned and may be
/// taken over.
pub struct PassLock {
    db: SqlitePool,
    holder: String,
    ttl: Duration,
}

impl PassLock {
    pub fn new(db: &Database, ttl: Duration) -> Self {
        Self {
            db: db.pool().clone(),
            holder: Uuid::new_v4().to_string(),
            ttl,
        }
    }

    /// Try to take the lease. `Ok(false)` means another holder has it.
    pub async fn try_acquire(&self) -> Result<bool> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::MAX);
        let stale_before = now
            .checked_sub_signed(ttl)
            .map(|t| t.timestamp_micros())
            .unwrap_or(i64::MIN);

        let result = sqlx::query(
            r#"
            UPDATE pass_lock
            SET holder = ?, acquired_at = ?
            WHERE id = 1 AND (holder IS NULL OR acquired_at < ?)
            "#,
        )
        .bind(&self.holder)
        .bind(now.timestamp_micros())
        .bind(stale_before)
        .execute(&self.db)
        .await?;

        let acquired = result.rows_affected() == 1;
        if acquired {
            debug!("Acquired pass lease {}", self.holder);
        } else {
            debug!("Pass lease held elsewhere");
        }
        Ok(acquired)
    }

    /// Give the lease back if this instance still holds it.
    pub async fn release(&self) -> Result<()> {
        let result = sqlx::query("UPDATE pass_lock SET holder = NULL, acquired_at = NULL WHERE id = 1 AND holder = ?")
            .bind(&self.holder)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            warn!("Pass lease {} was taken over before release", self.holder);
        }
        Ok(())
    }
}
