//! Relative duration literals such as `-10d`, `+2w` or `3M`.
//!
//! The grammar is `[+-]?<digits>[mhdwMy]?`. Lowercase `m` is minutes and
//! uppercase `M` is months; the remaining unit letters are matched without
//! regard to case once the grammar has accepted them.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DurationError;

const DURATION_PATTERN: &str = r"^([-+]?)(\d+)([mhdwMy]?)$";

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DURATION_PATTERN).expect("duration pattern compiles"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CalendarUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl CalendarUnit {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "m" => Some(CalendarUnit::Minute),
            "M" => Some(CalendarUnit::Month),
            _ if letter.eq_ignore_ascii_case("h") => Some(CalendarUnit::Hour),
            _ if letter.eq_ignore_ascii_case("d") => Some(CalendarUnit::Day),
            _ if letter.eq_ignore_ascii_case("w") => Some(CalendarUnit::Week),
            _ if letter.eq_ignore_ascii_case("y") => Some(CalendarUnit::Year),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            CalendarUnit::Minute => 'm',
            CalendarUnit::Hour => 'h',
            CalendarUnit::Day => 'd',
            CalendarUnit::Week => 'w',
            CalendarUnit::Month => 'M',
            CalendarUnit::Year => 'y',
        }
    }
}

impl fmt::Display for CalendarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for CalendarUnit {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalendarUnit::from_letter(s).ok_or_else(|| DurationError::InvalidFormat(s.to_string()))
    }
}

impl TryFrom<String> for CalendarUnit {
    type Error = DurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarUnit> for String {
    fn from(unit: CalendarUnit) -> Self {
        unit.letter().to_string()
    }
}

/// A parsed duration literal. `amount` is never negative; the sign is kept
/// apart so callers can pick what an unsigned literal means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationSpec {
    pub sign: Option<Sign>,
    pub amount: i64,
    pub unit: Option<CalendarUnit>,
}

impl DurationSpec {
    /// Amount with the sign applied, `default` standing in for a missing sign.
    pub fn signed_amount(&self, default: Sign) -> i64 {
        match self.sign.unwrap_or(default) {
            Sign::Positive => self.amount,
            Sign::Negative => -self.amount,
        }
    }

    /// `now` shifted by the signed amount.
    pub fn offset_from(
        &self,
        now: DateTime<Utc>,
        default_sign: Sign,
        default_unit: CalendarUnit,
    ) -> DateTime<Utc> {
        offset(
            now,
            self.signed_amount(default_sign),
            self.unit.unwrap_or(default_unit),
        )
    }

    /// `now` shifted into the past by the amount, whatever the literal's sign.
    pub fn lookback_from(&self, now: DateTime<Utc>, default_unit: CalendarUnit) -> DateTime<Utc> {
        offset(now, -self.amount, self.unit.unwrap_or(default_unit))
    }
}

/// Whether `input` is a well-formed duration literal.
pub fn matches(input: &str) -> bool {
    duration_regex().is_match(input)
}

pub fn parse(input: &str) -> Result<DurationSpec, DurationError> {
    let caps = duration_regex()
        .captures(input)
        .ok_or_else(|| DurationError::InvalidFormat(input.to_string()))?;

    let sign = match caps.get(1).map_or("", |m| m.as_str()) {
        "+" => Some(Sign::Positive),
        "-" => Some(Sign::Negative),
        _ => None,
    };

    let digits = caps.get(2).map_or("", |m| m.as_str());
    let amount = match digits.parse::<i64>() {
        Ok(n) => n,
        Err(e) => {
            // Reachable when a query is evaluated after failing validation.
            warn!(input, error = %e, "duration amount out of range, using 0");
            0
        }
    };

    let unit = caps
        .get(3)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .and_then(CalendarUnit::from_letter);

    Ok(DurationSpec { sign, amount, unit })
}

/// Shift `now` by `amount` units. Months and years move by calendar months;
/// results outside chrono's range saturate.
pub fn offset(now: DateTime<Utc>, amount: i64, unit: CalendarUnit) -> DateTime<Utc> {
    let shifted = match unit {
        CalendarUnit::Minute => shift_fixed(now, Duration::try_minutes(amount)),
        CalendarUnit::Hour => shift_fixed(now, Duration::try_hours(amount)),
        CalendarUnit::Day => shift_fixed(now, Duration::try_days(amount)),
        CalendarUnit::Week => shift_fixed(now, Duration::try_weeks(amount)),
        CalendarUnit::Month => shift_months(now, Some(amount)),
        CalendarUnit::Year => shift_months(now, amount.checked_mul(12)),
    };

    shifted.unwrap_or(if amount < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

fn shift_fixed(now: DateTime<Utc>, delta: Option<Duration>) -> Option<DateTime<Utc>> {
    now.checked_add_signed(delta?)
}

fn shift_months(now: DateTime<Utc>, months: Option<i64>) -> Option<DateTime<Utc>> {
    let months = months?;
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months < 0 {
        now.checked_sub_months(count)
    } else {
        now.checked_add_months(count)
    }
}
