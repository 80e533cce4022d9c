//! Starting and completing timed operations.
//!
//! Every timestamp comes from the [`Clock`]. The start and end transitions are
//! single guarded UPDATE statements, so two people pressing "start" at once
//! produce one winner and one `AlreadyStarted`.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::operations::{DeliveryStats, OperationError, OperationRecord, OperationRepository},
    db::users::User,
    domain::{
        Batch, OperationStatus, Role, batches,
        status::{duration_minutes, on_time_percentage},
    },
};

#[derive(Debug, Error)]
pub enum OperationServiceError {
    #[error("Batch not available for this date")]
    BatchNotAvailable { batch: Batch, date: NaiveDate },
    #[error("Operation date must be between 2024 and 2100")]
    DateOutOfRange,
    #[error("Cannot modify operations for past dates")]
    ReadOnlyDate,
    #[error("Operation already started")]
    AlreadyStarted {
        started_by: String,
        started_at: Option<DateTime<FixedOffset>>,
    },
    #[error("Operation has not been started yet")]
    NotStarted,
    #[error("Operation already completed")]
    AlreadyCompleted,
    #[error("Operation not found")]
    NotFound,
    #[error("Use /operations/end-driver endpoint for Driver role")]
    DriverRequiresStats,
    #[error("{0}")]
    InvalidDeliveryStats(&'static str),
    #[error(transparent)]
    Repository(#[from] OperationError),
}

/// Wire form of one operation row.
#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    pub id: Uuid,
    pub operation_date: NaiveDate,
    pub day_of_week: String,
    pub month: String,
    pub year: i32,
    pub batch: String,
    pub operation_role: String,
    pub status: OperationStatus,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration_minutes: Option<i64>,
    pub total_orders: Option<i32>,
    pub on_time_deliveries: Option<i32>,
    pub on_time_percentage: Option<f64>,
    pub started_by: Option<String>,
    pub completed_by: Option<String>,
}

impl OperationView {
    pub fn from_record(record: OperationRecord, clock: &Clock) -> Self {
        let start_time = record.start_time.map(|t| clock.to_local(t));
        let end_time = record.end_time.map(|t| clock.to_local(t));

        Self {
            id: record.id,
            operation_date: record.operation_date,
            day_of_week: record.day_of_week,
            month: record.month,
            year: record.year,
            batch: record.batch,
            operation_role: record.operation_role,
            status: OperationStatus::derive(start_time.as_ref(), end_time.as_ref()),
            duration_minutes: duration_minutes(start_time.as_ref(), end_time.as_ref()),
            start_time,
            end_time,
            total_orders: record.total_orders,
            on_time_deliveries: record.on_time_deliveries,
            on_time_percentage: on_time_percentage(record.total_orders, record.on_time_deliveries),
            started_by: record.started_by_name,
            completed_by: record.completed_by_name,
        }
    }
}

/// One role in a batch's status board.
#[derive(Debug, Clone, Serialize)]
pub struct RoleStatusView {
    pub role: Role,
    pub order: u8,
    pub status: OperationStatus,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration_minutes: Option<i64>,
    pub started_by: Option<String>,
    pub completed_by: Option<String>,
    pub total_orders: Option<i32>,
    pub on_time_deliveries: Option<i32>,
    pub on_time_percentage: Option<f64>,
}

impl RoleStatusView {
    pub fn pending(role: Role) -> Self {
        Self {
            role,
            order: role.order(),
            status: OperationStatus::Pending,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            started_by: None,
            completed_by: None,
            total_orders: None,
            on_time_deliveries: None,
            on_time_percentage: None,
        }
    }

    fn from_record(role: Role, record: &OperationRecord, clock: &Clock) -> Self {
        let start_time = record.start_time.map(|t| clock.to_local(t));
        let end_time = record.end_time.map(|t| clock.to_local(t));
        let driver = role.is_driver();

        Self {
            role,
            order: role.order(),
            status: OperationStatus::derive(start_time.as_ref(), end_time.as_ref()),
            duration_minutes: duration_minutes(start_time.as_ref(), end_time.as_ref()),
            start_time,
            end_time,
            started_by: record.started_by_name.clone(),
            completed_by: record.completed_by_name.clone(),
            total_orders: record.total_orders.filter(|_| driver),
            on_time_deliveries: record.on_time_deliveries.filter(|_| driver),
            on_time_percentage: if driver {
                on_time_percentage(record.total_orders, record.on_time_deliveries)
            } else {
                None
            },
        }
    }
}

/// Result of a start or end transition.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub operation: OperationView,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PreviousRoleCheck {
    pub current_role: Role,
    pub previous_role: Option<Role>,
    pub is_previous_completed: bool,
    pub show_warning: bool,
    pub warning_message: Option<String>,
}

/// Reject unavailable batches first, then dates that cannot be edited.
pub fn ensure_writable(
    date: NaiveDate,
    batch: Batch,
    today: NaiveDate,
) -> Result<(), OperationServiceError> {
    if !batch.is_available_on(date) {
        return Err(OperationServiceError::BatchNotAvailable { batch, date });
    }
    ensure_editable(date, today)
}

/// Date checks shared by start and completion.
pub fn ensure_editable(date: NaiveDate, today: NaiveDate) -> Result<(), OperationServiceError> {
    if !batches::is_operating_date(date) {
        return Err(OperationServiceError::DateOutOfRange);
    }
    if date < today {
        return Err(OperationServiceError::ReadOnlyDate);
    }
    Ok(())
}

pub fn validate_delivery_stats(
    total_orders: i32,
    on_time_deliveries: i32,
) -> Result<DeliveryStats, OperationServiceError> {
    if total_orders < 0 {
        return Err(OperationServiceError::InvalidDeliveryStats(
            "Total orders cannot be negative",
        ));
    }
    if on_time_deliveries < 0 {
        return Err(OperationServiceError::InvalidDeliveryStats(
            "On-time deliveries cannot be negative",
        ));
    }
    if on_time_deliveries > total_orders {
        return Err(OperationServiceError::InvalidDeliveryStats(
            "On-time deliveries cannot exceed total orders",
        ));
    }
    Ok(DeliveryStats {
        total_orders,
        on_time_deliveries,
    })
}

/// Warning attached to a start when the predecessor row exists but is open.
pub fn start_warning(role: Role, previous: Option<&OperationRecord>) -> Option<String> {
    let previous_role = role.previous()?;
    match previous {
        Some(record) if !record.is_completed() => Some(format!(
            "Previous operation '{previous_role}' not completed yet"
        )),
        _ => None,
    }
}

pub fn previous_role_check(role: Role, previous: Option<&OperationRecord>) -> PreviousRoleCheck {
    let Some(previous_role) = role.previous() else {
        return PreviousRoleCheck {
            current_role: role,
            previous_role: None,
            is_previous_completed: true,
            show_warning: false,
            warning_message: None,
        };
    };

    let completed = previous.is_some_and(OperationRecord::is_completed);
    PreviousRoleCheck {
        current_role: role,
        previous_role: Some(previous_role),
        is_previous_completed: completed,
        show_warning: !completed,
        warning_message: (!completed).then(|| {
            format!("Previous operation '{previous_role}' not completed yet. Continue anyway?")
        }),
    }
}

/// Non-driver roles that are missing or still open, in role order.
pub fn incomplete_roles(records: &[OperationRecord]) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|role| !role.is_driver())
        .filter(|role| {
            !records
                .iter()
                .any(|r| r.operation_role == role.as_str() && r.is_completed())
        })
        .collect()
}

/// All eleven roles in order, pending where no row exists.
pub fn role_board(records: &[OperationRecord], clock: &Clock) -> Vec<RoleStatusView> {
    Role::ALL
        .into_iter()
        .map(|role| {
            records
                .iter()
                .find(|r| r.operation_role == role.as_str())
                .map(|r| RoleStatusView::from_record(role, r, clock))
                .unwrap_or_else(|| RoleStatusView::pending(role))
        })
        .collect()
}

pub struct OperationService<'a> {
    pool: &'a PgPool,
    clock: &'a Clock,
}

impl<'a> OperationService<'a> {
    pub fn new(pool: &'a PgPool, clock: &'a Clock) -> Self {
        Self { pool, clock }
    }

    fn repo(&self) -> OperationRepository<'a> {
        OperationRepository::new(self.pool)
    }

    #[instrument(name = "operations.start", skip(self, user), fields(user_id = %user.id))]
    pub async fn start(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
        user: &User,
    ) -> Result<OperationOutcome, OperationServiceError> {
        ensure_writable(date, batch, self.clock.today())?;
        let repo = self.repo();

        let previous = match role.previous() {
            Some(previous_role) => repo.find(date, batch, previous_role).await?,
            None => None,
        };
        let warning = start_warning(role, previous.as_ref());

        let Some(record) = repo
            .try_start(date, batch, role, user.id, self.clock.now_utc())
            .await?
        else {
            let existing = repo.find(date, batch, role).await?;
            return Err(self.already_started(existing));
        };

        info!(%date, %batch, %role, "operation started");
        Ok(OperationOutcome {
            operation: OperationView::from_record(record, self.clock),
            warning,
        })
    }

    #[instrument(name = "operations.end", skip(self, user), fields(user_id = %user.id))]
    pub async fn end(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
        user: &User,
    ) -> Result<OperationOutcome, OperationServiceError> {
        if role.is_driver() {
            return Err(OperationServiceError::DriverRequiresStats);
        }
        ensure_editable(date, self.clock.today())?;

        let record = self.complete(date, batch, role, user, None).await?;
        info!(%date, %batch, %role, "operation completed");

        Ok(OperationOutcome {
            operation: OperationView::from_record(record, self.clock),
            warning: None,
        })
    }

    #[instrument(name = "operations.end_driver", skip(self, user), fields(user_id = %user.id))]
    pub async fn end_driver(
        &self,
        date: NaiveDate,
        batch: Batch,
        total_orders: i32,
        on_time_deliveries: i32,
        user: &User,
    ) -> Result<OperationOutcome, OperationServiceError> {
        let stats = validate_delivery_stats(total_orders, on_time_deliveries)?;
        ensure_editable(date, self.clock.today())?;

        let record = self
            .complete(date, batch, Role::Driver, user, Some(stats))
            .await?;

        let others = self.repo().find_for_batch(date, batch).await?;
        let pending = incomplete_roles(&others);
        let warning = (!pending.is_empty()).then(|| {
            let names: Vec<&str> = pending.iter().map(|r| r.as_str()).collect();
            format!("Roles not completed: {}", names.join(", "))
        });

        info!(
            %date,
            %batch,
            total_orders,
            on_time_deliveries,
            "driver operation completed"
        );
        Ok(OperationOutcome {
            operation: OperationView::from_record(record, self.clock),
            warning,
        })
    }

    async fn complete(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
        user: &User,
        stats: Option<DeliveryStats>,
    ) -> Result<OperationRecord, OperationServiceError> {
        let repo = self.repo();
        let existing = repo.find(date, batch, role).await?;
        match existing {
            None => return Err(OperationServiceError::NotStarted),
            Some(ref record) if !record.is_started() => {
                return Err(OperationServiceError::NotStarted);
            }
            Some(ref record) if record.is_completed() => {
                return Err(OperationServiceError::AlreadyCompleted);
            }
            Some(_) => {}
        }

        match repo
            .try_complete(date, batch, role, user.id, self.clock.now_utc(), stats)
            .await?
        {
            Some(record) => Ok(record),
            // Lost a race with another completion.
            None => Err(OperationServiceError::AlreadyCompleted),
        }
    }

    fn already_started(&self, existing: Option<OperationRecord>) -> OperationServiceError {
        let (started_by, started_at) = match existing {
            Some(record) => (
                record.started_by_name.unwrap_or_else(|| "Unknown".to_string()),
                record.start_time.map(|t| self.clock.to_local(t)),
            ),
            None => ("Unknown".to_string(), None),
        };
        OperationServiceError::AlreadyStarted {
            started_by,
            started_at,
        }
    }

    pub async fn check_previous(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
    ) -> Result<PreviousRoleCheck, OperationServiceError> {
        let previous = match role.previous() {
            Some(previous_role) => self.repo().find(date, batch, previous_role).await?,
            None => None,
        };
        Ok(previous_role_check(role, previous.as_ref()))
    }

    pub async fn get(
        &self,
        date: NaiveDate,
        batch: Batch,
        role: Role,
    ) -> Result<OperationView, OperationServiceError> {
        self.repo()
            .find(date, batch, role)
            .await?
            .map(|record| OperationView::from_record(record, self.clock))
            .ok_or(OperationServiceError::NotFound)
    }

    pub async fn roles_status(
        &self,
        date: NaiveDate,
        batch: Batch,
    ) -> Result<Vec<RoleStatusView>, OperationServiceError> {
        let records = self.repo().find_for_batch(date, batch).await?;
        Ok(role_board(&records, self.clock))
    }
}

/// Detail text for an unavailable batch, listing what the day allows.
pub fn batch_unavailable_detail(batch: Batch, date: NaiveDate) -> String {
    format!(
        "Batch {batch} is not available for this date. Available batches: {}",
        batches::describe_available(date)
    )
}
