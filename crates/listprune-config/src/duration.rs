//! Administrator-supplied duration spans
//!
//! List settings express windows as plain English ("6 months", "1 year",
//! bare "week"). Years and months are calendar arithmetic with day
//! clamping; smaller units are exact.

use time::{Date, Month, OffsetDateTime};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub amount: i64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
}

/// Largest accepted amount for any unit. `Date` only supports years in
/// `-9999..=9999`, so a span past this limit cannot be subtracted anyway.
const MAX_AMOUNT: i64 = 9_000;

/// Parse a span like `6 months`, `6months`, `1 year`, or bare `year`
/// (amount defaults to 1). Amounts beyond [`MAX_AMOUNT`] are rejected.
pub fn parse(input: &str) -> Result<Span, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());
    let trimmed = input.trim();

    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    let amount = if digits.is_empty() {
        1
    } else {
        digits.parse::<i64>().map_err(|_| invalid())?
    };

    let unit_str = trimmed[digits.len()..].trim();
    let unit_str = unit_str.strip_suffix('s').unwrap_or(unit_str);
    let unit = match unit_str {
        "year" => Unit::Years,
        "month" => Unit::Months,
        "week" => Unit::Weeks,
        "day" => Unit::Days,
        "hour" => Unit::Hours,
        _ => return Err(invalid()),
    };

    if amount > MAX_AMOUNT {
        return Err(invalid());
    }

    Ok(Span { amount, unit })
}

/// The instant `span` before `now`.
pub fn ago(now: OffsetDateTime, span: Span) -> OffsetDateTime {
    match span.unit {
        Unit::Years => months_ago(now, span.amount * 12),
        Unit::Months => months_ago(now, span.amount),
        Unit::Weeks => now - time::Duration::weeks(span.amount),
        Unit::Days => now - time::Duration::days(span.amount),
        Unit::Hours => now - time::Duration::hours(span.amount),
    }
}

/// Calendar month subtraction; the day of month is clamped into the target
/// month (Mar 31 minus one month is Feb 28/29).
pub fn months_ago(now: OffsetDateTime, months: i64) -> OffsetDateTime {
    let date = now.date();
    let total = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1 - months;
    let year = total.div_euclid(12) as i32;
    let month = Month::try_from((total.rem_euclid(12) + 1) as u8).expect("month is in 1..=12");
    let day = date.day().min(time::util::days_in_year_month(year, month));
    let date = Date::from_calendar_date(year, month, day).expect("clamped day is valid");
    now.replace_date(date)
}
