// src/bot/duration.rs - Free-text timeout durations ("10m", "5sec", "2 days")

use chrono::Duration;
use regex::Regex;
use std::sync::OnceLock;

use crate::types::{ModerationError, ModerationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Self::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }

    fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*([A-Za-z]+)$").expect("valid duration regex"))
}

/// Parse an amount followed by a unit, e.g. `10m`, `1h`, `5sec`, `3 days`.
pub fn parse_duration(input: &str) -> ModerationResult<Duration> {
    let invalid = || ModerationError::InvalidDuration(input.to_string());

    let caps = duration_regex().captures(input.trim()).ok_or_else(invalid)?;
    let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = DurationUnit::from_token(&caps[2]).ok_or_else(invalid)?;

    if amount <= 0 {
        return Err(invalid());
    }

    amount
        .checked_mul(unit.seconds())
        .and_then(Duration::try_seconds)
        .ok_or_else(invalid)
}

/// Short human form used in replies, e.g. `1h 30m`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    if total <= 0 {
        return "0s".to_string();
    }

    let parts = [
        (total / 86_400, "d"),
        ((total % 86_400) / 3_600, "h"),
        ((total % 3_600) / 60, "m"),
        (total % 60, "s"),
    ];

    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}
