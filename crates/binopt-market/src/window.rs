//! Weekly creation window for markets that do not trade around the clock

use crate::{MarketError, MarketResult};
use binopt_types::Timestamp;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: u64 = 86_400;

/// A point in the trading week (UTC), weekday 0 = Sunday
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeeklyTime {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
}

impl WeeklyTime {
    pub fn new(weekday: u8, hour: u8, minute: u8) -> MarketResult<Self> {
        if weekday > 6 || hour > 23 || minute > 59 {
            return Err(MarketError::InvalidParameter {
                name: "weekly_time",
                reason: format!("{weekday} {hour:02}:{minute:02} is not a valid time of week"),
            });
        }
        Ok(Self {
            weekday,
            hour,
            minute,
        })
    }

    /// Seconds since Sunday 00:00
    pub fn offset(&self) -> u64 {
        u64::from(self.weekday) * SECONDS_PER_DAY
            + u64::from(self.hour) * 3_600
            + u64::from(self.minute) * 60
    }
}

/// Window during the week in which options may be created
///
/// An option may be created when the window is open now and the option
/// expires strictly before the window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationWindow {
    pub open: WeeklyTime,
    pub close: WeeklyTime,
}

impl Default for CreationWindow {
    fn default() -> Self {
        Self {
            open: WeeklyTime {
                weekday: 0,
                hour: 22,
                minute: 0,
            },
            close: WeeklyTime {
                weekday: 5,
                hour: 20,
                minute: 0,
            },
        }
    }
}

impl CreationWindow {
    pub fn new(open: WeeklyTime, close: WeeklyTime) -> MarketResult<Self> {
        if open >= close {
            return Err(MarketError::InvalidParameter {
                name: "creation_window",
                reason: "window must open before it closes within the week".to_string(),
            });
        }
        Ok(Self { open, close })
    }

    /// Whether an option of `period` seconds may be created at `now`
    pub fn is_in_creation_window(&self, now: Timestamp, period: u64) -> bool {
        let Some(offset) = week_offset(now) else {
            return false;
        };
        self.open.offset() <= offset && offset.saturating_add(period) < self.close.offset()
    }
}

/// Seconds since the most recent Sunday 00:00 UTC
fn week_offset(now: Timestamp) -> Option<u64> {
    let secs = i64::try_from(now).ok()?;
    let at: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
    let weekday = u64::from(at.weekday().num_days_from_sunday());
    Some(weekday * SECONDS_PER_DAY + u64::from(at.num_seconds_from_midnight()))
}
