//! Display formatting for the terminal front end.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use stockroom_session::{TokenInfo, TokenStatus};

/// Stock level shown as a badge next to a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    OutOfStock,
    Low,
    Normal,
    Sufficient,
}

impl StockLevel {
    /// Classify a quantity: 0 is out of stock, up to 5 low, up to 10 normal.
    pub fn from_quantity(quantity: i64) -> Self {
        match quantity {
            q if q <= 0 => StockLevel::OutOfStock,
            1..=5 => StockLevel::Low,
            6..=10 => StockLevel::Normal,
            _ => StockLevel::Sufficient,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockLevel::OutOfStock => "out of stock",
            StockLevel::Low => "low",
            StockLevel::Normal => "normal",
            StockLevel::Sufficient => "sufficient",
        }
    }

    /// ANSI color for the badge.
    pub fn color(&self) -> &'static str {
        match self {
            StockLevel::OutOfStock => colors::RED,
            StockLevel::Low => colors::YELLOW,
            StockLevel::Normal => colors::CYAN,
            StockLevel::Sufficient => colors::GREEN,
        }
    }

    /// `[label]`, colored when `colorize` is set.
    pub fn badge(&self, colorize: bool) -> String {
        if colorize {
            format!("{}[{}]{}", self.color(), self.label(), colors::RESET)
        } else {
            format!("[{}]", self.label())
        }
    }
}

/// ANSI color codes.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Format an integer with thousands separators.
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a decimal quantity with two fraction digits and thousands separators.
pub fn format_quantity(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let whole = rounded.trunc() as i64;
    let fraction = ((rounded - whole as f64).abs() * 100.0).round() as u32;
    let sign = if rounded < 0.0 && whole == 0 { "-" } else { "" };
    format!("{sign}{}.{fraction:02}", format_number(whole))
}

/// Format a timestamp as `YYYY. MM. DD. HH:MM` in the given offset.
pub fn format_datetime(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp
        .with_timezone(&offset)
        .format("%Y. %m. %d. %H:%M")
        .to_string()
}

/// Parse a server timestamp: RFC 3339, or naive ISO 8601 read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Describe a duration in seconds as `2h 5m`, `45m`, or `30s`.
fn format_remaining(secs: i64) -> String {
    let secs = secs.max(0);
    let (hours, minutes) = (secs / 3600, (secs % 3600) / 60);
    match (hours, minutes) {
        (0, 0) => format!("{secs}s"),
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m}m"),
    }
}

fn describe_token(name: &str, info: &TokenInfo, offset: FixedOffset) -> String {
    if !info.exists {
        return format!("{name:<8} missing");
    }

    let state = if info.expired { "expired" } else { "valid" };
    match (info.expiry_time, info.time_until_expiry()) {
        (Some(expiry), Some(remaining)) if !info.expired => format!(
            "{name:<8} {state}, expires {} (in {})",
            format_datetime(expiry, offset),
            format_remaining(remaining)
        ),
        (Some(expiry), _) => format!(
            "{name:<8} {state} since {}",
            format_datetime(expiry, offset)
        ),
        _ => format!("{name:<8} {state}"),
    }
}

/// Format token status for display.
pub fn format_token_status(status: &TokenStatus, offset: FixedOffset) -> Vec<String> {
    vec![
        describe_token("Access:", &status.access_token, offset),
        describe_token("Refresh:", &status.refresh_token, offset),
    ]
}
