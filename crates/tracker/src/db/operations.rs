use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Batch, Role, batches};

/// Expands to a SELECT over `$source` (aliased `o`) with starter and
/// completer names joined in.
macro_rules! with_user_names {
    ($source:literal) => {
        concat!(
            "SELECT o.*, s.name AS started_by_name, c.name AS completed_by_name FROM ",
            $source,
            " o LEFT JOIN users s ON s.id = o.started_by_user_id",
            " LEFT JOIN users c ON c.id = o.completed_by_user_id"
        )
    };
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationRecord {
    pub id: Uuid,
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub month: String,
    pub year: i32,
    pub batch: String,
    pub operation_role: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_orders: Option<i32>,
    pub on_time_deliveries: Option<i32>,
    pub started_by_user_id: Option<Uuid>,
    pub completed_by_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_by_name: Option<String>,
    pub completed_by_name: Option<String>,
}

impl OperationRecord {
    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Delivery figures recorded when the Driver role completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub total_orders: i32,
    pub on_time_deliveries: i32,
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub struct OperationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OperationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
    ) -> Result<Option<OperationRecord>, OperationError> {
        let record = sqlx::query_as::<_, OperationRecord>(concat!(
            with_user_names!("operations_log"),
            " WHERE o.operation_date = $1 AND o.batch = $2 AND o.operation_role = $3"
        ))
        .bind(date)
        .bind(batch.as_str())
        .bind(role.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find_for_batch(
        &self,
        date: NaiveDate,
        batch: Batch,
    ) -> Result<Vec<OperationRecord>, OperationError> {
        let records = sqlx::query_as::<_, OperationRecord>(concat!(
            with_user_names!("operations_log"),
            " WHERE o.operation_date = $1 AND o.batch = $2"
        ))
        .bind(date)
        .bind(batch.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn find_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<OperationRecord>, OperationError> {
        let records = sqlx::query_as::<_, OperationRecord>(concat!(
            with_user_names!("operations_log"),
            " WHERE o.operation_date = $1 ORDER BY o.batch"
        ))
        .bind(date)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Insert pending rows for `roles` that do not exist yet. Returns how many
    /// were created.
    pub async fn ensure_pending(
        &self,
        date: NaiveDate,
        batch: Batch,
        roles: &[Role],
    ) -> Result<u64, OperationError> {
        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        let ids: Vec<Uuid> = roles.iter().map(|_| Uuid::new_v4()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO operations_log
                (id, operation_date, day_of_week, month, year, batch, operation_role)
            SELECT r.id, $1, $2, $3, $4, $5, r.role
            FROM UNNEST($6::uuid[], $7::text[]) AS r(id, role)
            ON CONFLICT (operation_date, batch, operation_role) DO NOTHING
            "#,
        )
        .bind(date)
        .bind(batches::day_name(date))
        .bind(batches::month_name(date))
        .bind(date.year())
        .bind(batch.as_str())
        .bind(&ids)
        .bind(&names)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stamp the start time if nobody has yet. `None` means the operation was
    /// already started.
    pub async fn try_start(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<OperationRecord>, OperationError> {
        self.ensure_pending(date, batch, &[role]).await?;

        let record = sqlx::query_as::<_, OperationRecord>(concat!(
            "WITH updated AS (",
            "UPDATE operations_log SET start_time = $4, started_by_user_id = $5, updated_at = $4",
            " WHERE operation_date = $1 AND batch = $2 AND operation_role = $3",
            " AND start_time IS NULL RETURNING *) ",
            with_user_names!("updated")
        ))
        .bind(date)
        .bind(batch.as_str())
        .bind(role.as_str())
        .bind(now)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Stamp the end time on a started, unfinished operation. `None` means the
    /// row changed state underneath the caller.
    pub async fn try_complete(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
        user_id: Uuid,
        now: DateTime<Utc>,
        stats: Option<DeliveryStats>,
    ) -> Result<Option<OperationRecord>, OperationError> {
        let record = sqlx::query_as::<_, OperationRecord>(concat!(
            "WITH updated AS (",
            "UPDATE operations_log SET end_time = $4, completed_by_user_id = $5, updated_at = $4,",
            " total_orders = COALESCE($6, total_orders),",
            " on_time_deliveries = COALESCE($7, on_time_deliveries)",
            " WHERE operation_date = $1 AND batch = $2 AND operation_role = $3",
            " AND start_time IS NOT NULL AND end_time IS NULL RETURNING *) ",
            with_user_names!("updated")
        ))
        .bind(date)
        .bind(batch.as_str())
        .bind(role.as_str())
        .bind(now)
        .bind(user_id)
        .bind(stats.map(|s| s.total_orders))
        .bind(stats.map(|s| s.on_time_deliveries))
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}
