//! Timestamp and ISO week utilities
//!
//! Snapshots are keyed by ISO (year, week). The week's Monday is stored
//! alongside as the snapshot date.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// ISO calendar period a snapshot belongs to
///
/// Ordering is chronological: by year, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImportPeriod {
    pub year: i32,
    pub week: u32,
}

impl ImportPeriod {
    /// Build a period, rejecting weeks that do not exist in `year`
    pub fn new(year: i32, week: u32) -> Result<Self> {
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(Error::InvalidInput(format!(
                "ISO week {} does not exist in {}",
                week, year
            )));
        }
        Ok(Self { year, week })
    }

    /// Period containing `date`
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Period containing today (UTC)
    pub fn current() -> Self {
        Self::from_date(now().date_naive())
    }

    /// Monday of this ISO week
    pub fn monday(&self) -> NaiveDate {
        // Weeks are validated on construction; from_date always yields a real week
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or(NaiveDate::MIN)
    }

    /// The period one week earlier
    pub fn previous(&self) -> Self {
        Self::from_date(self.monday() - chrono::Duration::days(7))
    }
}

impl fmt::Display for ImportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for ImportPeriod {
    type Err = Error;

    /// Parse `YYYY-Www` (e.g. `2024-W07`)
    fn from_str(s: &str) -> Result<Self> {
        let (year, week) = s
            .split_once("-W")
            .ok_or_else(|| Error::InvalidInput(format!("Expected YYYY-Www, got '{}'", s)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid year in '{}'", s)))?;
        let week: u32 = week
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid week in '{}'", s)))?;
        Self::new(year, week)
    }
}
