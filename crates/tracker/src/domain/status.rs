use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::Role;

/// Lifecycle of a single (date, batch, role) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
}

impl OperationStatus {
    pub fn derive<Tz: TimeZone>(
        start_time: Option<&DateTime<Tz>>,
        end_time: Option<&DateTime<Tz>>,
    ) -> Self {
        match (start_time, end_time) {
            (_, Some(_)) => OperationStatus::Completed,
            (Some(_), None) => OperationStatus::InProgress,
            (None, None) => OperationStatus::Pending,
        }
    }
}

/// Colour code for a batch on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    /// No role started.
    Red,
    /// Work underway.
    Yellow,
    /// Every role completed.
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    pub status: BatchStatus,
    pub started_count: i64,
    pub completed_count: i64,
    pub total_roles: i64,
    pub progress_percentage: f64,
}

impl BatchProgress {
    pub fn from_counts(started_count: i64, completed_count: i64) -> Self {
        let total_roles = Role::COUNT as i64;
        let status = if started_count == 0 {
            BatchStatus::Red
        } else if completed_count >= total_roles {
            BatchStatus::Green
        } else {
            BatchStatus::Yellow
        };

        Self {
            status,
            started_count,
            completed_count,
            total_roles,
            progress_percentage: percentage(completed_count, total_roles).unwrap_or(0.0),
        }
    }
}

/// `part / whole * 100` rounded to two decimals; `None` when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> Option<f64> {
    if whole <= 0 {
        return None;
    }
    Some(round2(part as f64 / whole as f64 * 100.0))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whole minutes between two instants, truncated toward zero.
pub fn duration_minutes<Tz: TimeZone>(
    start_time: Option<&DateTime<Tz>>,
    end_time: Option<&DateTime<Tz>>,
) -> Option<i64> {
    match (start_time, end_time) {
        (Some(start), Some(end)) => Some((end.clone() - start.clone()).num_minutes()),
        _ => None,
    }
}

pub fn on_time_percentage(total_orders: Option<i32>, on_time_deliveries: Option<i32>) -> Option<f64> {
    match (total_orders, on_time_deliveries) {
        (Some(total), Some(on_time)) if total > 0 => percentage(on_time.into(), total.into()),
        _ => None,
    }
}

/// Human readable duration such as `1h 30m` or `45m`.
pub fn format_duration(minutes: i64) -> String {
    if minutes < 0 {
        return "N/A".to_string();
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn test_operation_status_from_timestamps() {
        let now = Utc::now();
        assert_eq!(OperationStatus::derive::<Utc>(None, None), OperationStatus::Pending);
        assert_eq!(OperationStatus::derive(Some(&now), None), OperationStatus::InProgress);
        assert_eq!(
            OperationStatus::derive(Some(&now), Some(&now)),
            OperationStatus::Completed
        );
    }

    #[test]
    fn test_batch_colour() {
        assert_eq!(BatchProgress::from_counts(0, 0).status, BatchStatus::Red);
        assert_eq!(BatchProgress::from_counts(5, 3).status, BatchStatus::Yellow);
        assert_eq!(BatchProgress::from_counts(11, 10).status, BatchStatus::Yellow);
        assert_eq!(BatchProgress::from_counts(11, 11).status, BatchStatus::Green);
    }

    #[test]
    fn test_progress_percentage_rounding() {
        let progress = BatchProgress::from_counts(5, 3);
        assert_eq!(progress.total_roles, 11);
        assert_eq!(progress.progress_percentage, 27.27);
        assert_eq!(BatchProgress::from_counts(11, 11).progress_percentage, 100.0);
    }

    #[test]
    fn test_duration_truncates_to_minutes() {
        let start = Utc::now();
        let end = start + Duration::seconds(90 * 60 + 59);
        assert_eq!(duration_minutes(Some(&start), Some(&end)), Some(90));
        assert_eq!(duration_minutes(Some(&start), None), None);
    }

    #[test]
    fn test_on_time_percentage() {
        assert_eq!(on_time_percentage(Some(150), Some(142)), Some(94.67));
        assert_eq!(on_time_percentage(Some(0), Some(0)), None);
        assert_eq!(on_time_percentage(Some(10), None), None);
        assert_eq!(on_time_percentage(None, Some(3)), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(90), "1h 30m");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(-1), "N/A");
    }
}
