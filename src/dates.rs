use crate::error::{AppError, Result};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, TimeDelta, TimeZone, Timelike, Utc,
};

/// Renders due dates the way the user reads them: relative to today, in the
/// user's UTC offset, on a 12- or 24-hour clock.
#[derive(Debug, Clone, Copy)]
pub struct DateFormatter {
    offset: FixedOffset,
    use_24_hour_clock: bool,
}

impl DateFormatter {
    pub fn new(utc_offset_minutes: i32, use_24_hour_clock: bool) -> Result<Self> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Format(format!("UTC offset out of range: {} minutes", utc_offset_minutes))
            })?;
        Ok(Self {
            offset,
            use_24_hour_clock,
        })
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
            use_24_hour_clock: false,
        }
    }

    fn local(&self, millis: i64) -> Result<NaiveDateTime> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .and_then(|dt| self.shift(dt))
            .ok_or_else(|| AppError::Format(format!("Timestamp out of range: {}", millis)))
    }

    // Near the ends of chrono's range the offset can push local time past
    // `NaiveDateTime::MAX`, where `with_timezone` would panic.
    fn shift(&self, dt: DateTime<Utc>) -> Option<NaiveDateTime> {
        dt.naive_utc()
            .checked_add_signed(TimeDelta::seconds(i64::from(self.offset.local_minus_utc())))
    }

    /// A due date carries a time of day unless it sits exactly on local midnight.
    pub fn has_due_time(&self, millis: i64) -> bool {
        if millis <= 0 {
            return false;
        }
        match self.local(millis) {
            Ok(dt) => dt.num_seconds_from_midnight() != 0 || dt.nanosecond() != 0,
            Err(_) => false,
        }
    }

    pub fn relative_day(&self, millis: i64, now: DateTime<Utc>) -> Result<String> {
        let date = self.local(millis)?.date();
        let today = self
            .shift(now)
            .ok_or_else(|| AppError::Format(format!("Clock out of range: {}", now)))?
            .date();

        let label = match (date - today).num_days() {
            0 => "Today".to_string(),
            1 => "Tomorrow".to_string(),
            -1 => "Yesterday".to_string(),
            days if days.abs() < 7 => date.format("%A").to_string(),
            _ if date.year() == today.year() => date.format("%b %-d").to_string(),
            _ => date.format("%b %-d, %Y").to_string(),
        };
        Ok(label)
    }

    pub fn time_string(&self, millis: i64) -> Result<String> {
        let dt = self.local(millis)?;
        let pattern = if self.use_24_hour_clock {
            "%H:%M"
        } else {
            "%-I:%M %p"
        };
        Ok(dt.format(pattern).to_string())
    }

    /// `"<relative day> at <time>"` when the date has a time of day, the
    /// relative day alone otherwise. Unset dates render empty.
    pub fn relative_date_and_time(&self, millis: i64, now: DateTime<Utc>) -> Result<String> {
        let day = if millis > 0 {
            self.relative_day(millis, now)?
        } else {
            String::new()
        };

        if self.has_due_time(millis) {
            Ok(format!("{} at {}", day, self.time_string(millis)?))
        } else {
            Ok(day)
        }
    }
}
