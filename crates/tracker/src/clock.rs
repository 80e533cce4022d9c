//! Server-side time in the operating timezone.
//!
//! Timestamps are always taken from the server and stored in UTC. They are
//! rendered, and calendar dates are decided, in a fixed offset (West Africa
//! Time by default).

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Clock {
    name: String,
    offset: FixedOffset,
}

impl Clock {
    pub fn new(name: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    /// West Africa Time (`Africa/Lagos`, UTC+01:00, no daylight saving).
    pub fn west_africa() -> Self {
        Self::new("Africa/Lagos", wat_offset())
    }

    pub fn timezone_name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.to_local(self.now_utc())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// A date before today cannot be modified.
    pub fn is_read_only(&self, date: NaiveDate) -> bool {
        date < self.today()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::west_africa()
    }
}

fn wat_offset() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap_or_else(|| Utc.fix())
}

/// Parse an offset written as `+01:00`, `-0530` or `Z`.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
