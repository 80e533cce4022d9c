use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A daily fulfillment wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Batch {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid batch. Must be one of: A, B, C, D")]
pub struct InvalidBatch;

const RESTRICTED_BATCHES: [Batch; 3] = [Batch::A, Batch::B, Batch::C];

impl Batch {
    pub const ALL: [Batch; 4] = [Batch::A, Batch::B, Batch::C, Batch::D];

    pub fn as_str(self) -> &'static str {
        match self {
            Batch::A => "A",
            Batch::B => "B",
            Batch::C => "C",
            Batch::D => "D",
        }
    }

    /// Batches that run on `date`. Mondays and Thursdays have no batch D.
    pub fn available_for(date: NaiveDate) -> &'static [Batch] {
        if is_restricted_day(date) {
            &RESTRICTED_BATCHES
        } else {
            &Self::ALL
        }
    }

    pub fn is_available_on(self, date: NaiveDate) -> bool {
        Self::available_for(date).contains(&self)
    }
}

pub fn is_restricted_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Mon | Weekday::Thu)
}

/// Operating years the ledger accepts.
pub const OPERATING_YEARS: std::ops::RangeInclusive<i32> = 2024..=2100;

pub fn is_operating_date(date: NaiveDate) -> bool {
    OPERATING_YEARS.contains(&date.year())
}

pub fn day_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

pub fn month_name(date: NaiveDate) -> String {
    date.format("%B").to_string()
}

/// Comma-separated list of the batches running on `date`.
pub fn describe_available(date: NaiveDate) -> String {
    Batch::available_for(date)
        .iter()
        .map(|batch| batch.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Batch {
    type Err = InvalidBatch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Batch::A),
            "B" => Ok(Batch::B),
            "C" => Ok(Batch::C),
            "D" => Ok(Batch::D),
            _ => Err(InvalidBatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monday_and_thursday_have_no_batch_d() {
        // 2024-01-15 is a Monday.
        assert_eq!(Batch::available_for(date(2024, 1, 15)), &[Batch::A, Batch::B, Batch::C]);
        assert_eq!(Batch::available_for(date(2024, 1, 18)), &[Batch::A, Batch::B, Batch::C]);
        assert!(!Batch::D.is_available_on(date(2024, 1, 18)));
    }

    #[test]
    fn test_other_days_have_all_batches() {
        for day in [16, 17, 19, 20, 21] {
            assert_eq!(Batch::available_for(date(2024, 1, day)), &Batch::ALL);
        }
        assert!(Batch::D.is_available_on(date(2024, 1, 17)));
    }

    #[test]
    fn test_parse_normalises_case_and_whitespace() {
        assert_eq!(" b ".parse::<Batch>(), Ok(Batch::B));
        assert_eq!("d".parse::<Batch>(), Ok(Batch::D));
        assert_eq!("E".parse::<Batch>(), Err(InvalidBatch));
        assert_eq!("AB".parse::<Batch>(), Err(InvalidBatch));
    }

    #[test]
    fn test_calendar_names() {
        let monday = date(2024, 1, 15);
        assert_eq!(day_name(monday), "Monday");
        assert_eq!(month_name(monday), "January");
        assert!(is_restricted_day(monday));
        assert_eq!(describe_available(monday), "A, B, C");
    }

    #[test]
    fn test_operating_years() {
        assert!(is_operating_date(date(2024, 1, 1)));
        assert!(is_operating_date(date(2100, 12, 31)));
        assert!(!is_operating_date(date(2023, 12, 31)));
        assert!(!is_operating_date(date(2101, 1, 4)));
    }
}
