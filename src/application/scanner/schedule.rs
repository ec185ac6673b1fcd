//! Update check schedules.
//!
//! Accepted specs:
//!
//! - `@never` disables scheduled checks
//! - empty or `@default`: every fourth hour at a per-app minute
//! - `@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly`/`@annually`
//! - 5-field cron (a zero seconds field is prepended)
//! - 6- or 7-field cron, used as-is

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use sha2::{Digest, Sha256};

use crate::domain::app::DEFAULT_SCHEDULE;
use crate::domain::id::AppId;
use crate::error::ScheduleError;

/// Schedule spec that disables checks.
pub const NEVER_SCHEDULE: &str = "@never";

/// Parsed update check schedule of one app.
#[derive(Debug, Clone)]
pub enum UpdateSchedule {
    Never,
    Cron(Box<Schedule>),
}

impl UpdateSchedule {
    /// Parse `spec` for `app_id`. The app only matters for `@default`.
    pub fn parse(spec: &str, app_id: &AppId) -> Result<Self, ScheduleError> {
        let spec = spec.trim();
        let expression = match spec {
            NEVER_SCHEDULE => return Ok(Self::Never),
            "" | DEFAULT_SCHEDULE => default_expression(app_id),
            "@hourly" => "0 0 * * * *".to_string(),
            "@daily" | "@midnight" => "0 0 0 * * *".to_string(),
            "@weekly" => "0 0 0 * * Sun".to_string(),
            "@monthly" => "0 0 0 1 * *".to_string(),
            "@yearly" | "@annually" => "0 0 0 1 1 *".to_string(),
            other => match other.split_whitespace().count() {
                5 => format!("0 {other}"),
                6 | 7 => other.to_string(),
                n => {
                    return Err(ScheduleError::Invalid {
                        spec: spec.to_string(),
                        reason: format!("expected 5 to 7 fields, found {n}"),
                    })
                }
            },
        };

        Schedule::from_str(&expression)
            .map(|s| Self::Cron(Box::new(s)))
            .map_err(|e| ScheduleError::Invalid {
                spec: spec.to_string(),
                reason: e.to_string(),
            })
    }

    #[must_use]
    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// First fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::Cron(schedule) => schedule.after(&after).next(),
        }
    }
}

/// Default schedule: every fourth hour at a minute derived from the app ID.
#[must_use]
pub fn default_expression(app_id: &AppId) -> String {
    format!("0 {} */4 * * *", stable_minute(app_id))
}

/// Minute offset in `0..60`, stable across restarts and hosts.
fn stable_minute(app_id: &AppId) -> u32 {
    let digest = Sha256::digest(app_id.as_str().as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head % 60
}
