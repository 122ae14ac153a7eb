//! Daily active window for scheduled firings.
//!
//! The window is evaluated in one fixed UTC offset shared by every tenant.
//! It is half-open: `start` is inside, `end` is outside. A window whose
//! start is later than its end wraps midnight.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

use rota_core::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub offset: FixedOffset,
}

impl ScheduleWindow {
    pub fn parse(start: &str, end: &str, utc_offset: &str) -> Result<Self> {
        let start = parse_time_of_day(start)?;
        let end = parse_time_of_day(end)?;
        if start == end {
            return Err(AppError::InvalidConfig(format!(
                "schedule window {start}-{end} is empty"
            ))
            .into());
        }
        let offset = parse_utc_offset(utc_offset)?;
        Ok(Self { start, end, offset })
    }

    /// Whether `now` falls inside the window in the configured offset.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset).time();
        if self.start < self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| AppError::InvalidConfig(format!("invalid time of day '{value}': {e}")))
        .context("expected HH:MM")
}

/// Parse `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero UTC offset");
    }

    let (sign, rest) = match value.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!(AppError::InvalidConfig(format!(
            "UTC offset '{value}' must start with '+' or '-'"
        ))),
    };

    let (hours, minutes) = rest.split_once(':').ok_or_else(|| {
        AppError::InvalidConfig(format!("UTC offset '{value}' must look like +HH:MM"))
    })?;
    let hours: i32 = hours
        .parse()
        .map_err(|_| AppError::InvalidConfig(format!("invalid offset hours in '{value}'")))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| AppError::InvalidConfig(format!("invalid offset minutes in '{value}'")))?;
    if hours > 14 || minutes > 59 {
        bail!(AppError::InvalidConfig(format!(
            "UTC offset '{value}' is out of range"
        )));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| AppError::InvalidConfig(format!("UTC offset '{value}' is out of range")))
        .map_err(Into::into)
}
