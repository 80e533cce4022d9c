use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use super::operations::{RoleStatusView, role_board};
use crate::{
    clock::Clock,
    db::operations::{OperationError, OperationRecord, OperationRepository},
    domain::{
        Batch, BatchProgress, BatchStatus, Role, batches,
        status::percentage,
    },
};

#[derive(Debug, Error)]
pub enum BatchServiceError {
    #[error("Batch {batch} is not available for {date}")]
    NotAvailable { batch: Batch, date: NaiveDate },
    #[error("Operation date must be between 2024 and 2100")]
    DateOutOfRange,
    #[error(transparent)]
    Repository(#[from] OperationError),
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusView {
    pub batch: Batch,
    #[serde(flatten)]
    pub progress: BatchProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchListView {
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub is_restricted_day: bool,
    pub batches: Vec<BatchStatusView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDetailView {
    pub batch: Batch,
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub is_readonly: bool,
    #[serde(flatten)]
    pub progress: BatchProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRolesView {
    pub batch: Batch,
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub month: String,
    pub year: i32,
    pub is_readonly: bool,
    #[serde(flatten)]
    pub progress: BatchProgress,
    pub roles: Vec<RoleStatusView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub total_batches: i64,
    pub completed_batches: i64,
    pub total_roles: i64,
    pub completed_roles: i64,
    pub overall_progress: f64,
    pub total_orders_delivered: Option<i64>,
    pub total_on_time_deliveries: Option<i64>,
    pub overall_on_time_percentage: Option<f64>,
}

pub fn progress_of<'r>(records: impl IntoIterator<Item = &'r OperationRecord>) -> BatchProgress {
    let (started, completed) = records.into_iter().fold((0, 0), |(s, c), r| {
        (s + i64::from(r.is_started()), c + i64::from(r.is_completed()))
    });
    BatchProgress::from_counts(started, completed)
}

fn records_for<'r>(
    records: &'r [OperationRecord],
    batch: Batch,
) -> impl Iterator<Item = &'r OperationRecord> {
    records.iter().filter(move |r| r.batch == batch.as_str())
}

/// Aggregate one day across every batch that runs on it.
pub fn summarize_day(date: NaiveDate, records: &[OperationRecord]) -> DailySummary {
    let available = Batch::available_for(date);
    let total_batches = available.len() as i64;
    let total_roles = total_batches * Role::COUNT as i64;

    let mut completed_batches = 0;
    let mut completed_roles = 0;
    let mut total_orders = 0i64;
    let mut total_on_time = 0i64;

    for &batch in available {
        let progress = progress_of(records_for(records, batch));
        if progress.status == BatchStatus::Green {
            completed_batches += 1;
        }
        completed_roles += progress.completed_count;

        let driver = records_for(records, batch).find(|r| {
            r.operation_role == Role::Driver.as_str() && r.is_completed()
        });
        if let Some(driver) = driver
            && let Some(orders) = driver.total_orders.filter(|&n| n != 0)
        {
            total_orders += i64::from(orders);
            total_on_time += i64::from(driver.on_time_deliveries.unwrap_or(0));
        }
    }

    DailySummary {
        operation_date: date,
        day_of_week: batches::day_name(date),
        total_batches,
        completed_batches,
        total_roles,
        completed_roles,
        overall_progress: percentage(completed_roles, total_roles).unwrap_or(0.0),
        total_orders_delivered: (total_orders > 0).then_some(total_orders),
        total_on_time_deliveries: (total_on_time > 0).then_some(total_on_time),
        overall_on_time_percentage: percentage(total_on_time, total_orders),
    }
}

pub struct BatchService<'a> {
    pool: &'a PgPool,
    clock: &'a Clock,
}

impl<'a> BatchService<'a> {
    pub fn new(pool: &'a PgPool, clock: &'a Clock) -> Self {
        Self { pool, clock }
    }

    fn repo(&self) -> OperationRepository<'a> {
        OperationRepository::new(self.pool)
    }

    fn ensure_available(date: NaiveDate, batch: Batch) -> Result<(), BatchServiceError> {
        if batch.is_available_on(date) {
            Ok(())
        } else {
            Err(BatchServiceError::NotAvailable { batch, date })
        }
    }

    pub async fn list(&self, date: NaiveDate) -> Result<BatchListView, BatchServiceError> {
        let records = self.repo().find_for_date(date).await?;
        let batches = Batch::available_for(date)
            .iter()
            .map(|&batch| BatchStatusView {
                batch,
                progress: progress_of(records_for(&records, batch)),
            })
            .collect();

        Ok(BatchListView {
            operation_date: date,
            day_of_week: batches::day_name(date),
            is_restricted_day: batches::is_restricted_day(date),
            batches,
        })
    }

    pub async fn detail(
        &self,
        date: NaiveDate,
        batch: Batch,
    ) -> Result<BatchDetailView, BatchServiceError> {
        Self::ensure_available(date, batch)?;
        let records = self.repo().find_for_batch(date, batch).await?;

        Ok(BatchDetailView {
            batch,
            operation_date: date,
            day_of_week: batches::day_name(date),
            is_readonly: self.clock.is_read_only(date),
            progress: progress_of(&records),
        })
    }

    pub async fn with_roles(
        &self,
        date: NaiveDate,
        batch: Batch,
    ) -> Result<BatchRolesView, BatchServiceError> {
        Self::ensure_available(date, batch)?;
        let records = self.repo().find_for_batch(date, batch).await?;

        Ok(BatchRolesView {
            batch,
            operation_date: date,
            day_of_week: batches::day_name(date),
            month: batches::month_name(date),
            year: date.year(),
            is_readonly: self.clock.is_read_only(date),
            progress: progress_of(&records),
            roles: role_board(&records, self.clock),
        })
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, BatchServiceError> {
        let records = self.repo().find_for_date(date).await?;
        Ok(summarize_day(date, &records))
    }

    /// Create the missing pending rows, then report the batch.
    pub async fn initialize(
        &self,
        date: NaiveDate,
        batch: Batch,
    ) -> Result<BatchRolesView, BatchServiceError> {
        Self::ensure_available(date, batch)?;
        if !batches::is_operating_date(date) {
            return Err(BatchServiceError::DateOutOfRange);
        }
        let created = self.repo().ensure_pending(date, batch, &Role::ALL).await?;
        info!(%date, %batch, created, "batch initialized");
        self.with_roles(date, batch).await
    }
}
