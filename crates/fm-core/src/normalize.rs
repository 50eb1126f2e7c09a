//! Field normalizers for legacy export values.
//!
//! Every function here is total: bad input maps to `None` (or `0` for
//! amounts), never to an error or a panic. Adapters call these once per
//! field and never see the raw text again.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// MySQL dump marker for NULL.
pub const NULL_SENTINEL: &str = "\\N";

/// Zero-date some legacy exports write instead of NULL.
const ZERO_DATE: &str = "0000-00-00";

/// Datetime layouts tried in order by [`parse_date`].
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d, %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d, %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts tried after [`DATETIME_FORMATS`]; midnight is assumed.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

static EMAIL_SHAPE_RE: OnceLock<Regex> = OnceLock::new();
static DATE_LIKE_RE: OnceLock<Regex> = OnceLock::new();
static NUMERIC_TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn email_shape_regex() -> &'static Regex {
    EMAIL_SHAPE_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex literal")
    })
}

/// Date/time fragments that show up when an export shifted a timestamp
/// column into the email slot.
fn date_like_regex() -> &'static Regex {
    DATE_LIKE_RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}|\d{2}:\d{2}:\d{2}|\d{4}/\d{2}/\d{2}|\d{2}/\d{2}/\d{4}")
            .expect("valid regex literal")
    })
}

fn numeric_token_regex() -> &'static Regex {
    NUMERIC_TOKEN_RE
        .get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex literal"))
}

/// Trim a field and map the empty string and `\N` to `None`.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NULL_SENTINEL {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Lowercase, trim, and strip wrapping quotes from an email.
///
/// Does not validate; see [`is_valid_email`].
pub fn normalize_email(raw: &str) -> Option<String> {
    let mut value = raw.trim();
    while value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = value[1..value.len() - 1].trim();
    }
    if value.is_empty() || value == NULL_SENTINEL {
        return None;
    }
    Some(value.to_lowercase())
}

/// Basic `local@domain.tld` shape that contains no date or time fragment.
pub fn is_valid_email(email: &str) -> bool {
    email_shape_regex().is_match(email) && !date_like_regex().is_match(email)
}

/// Collapse whitespace and title-case each word.
pub fn normalize_name(raw: &str) -> Option<String> {
    let text = normalize_text(raw)?;
    let words: Vec<String> = text.split_whitespace().map(title_case_word).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Parse a legacy timestamp.
///
/// Accepts ISO-like datetimes (with `T` or space, optional fractional
/// seconds, RFC 3339 offsets) and `YYYY/MM/DD[, HH:MM]`. The zero-date
/// sentinel and anything unparseable map to `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let text = normalize_text(raw)?;
    if text.starts_with(ZERO_DATE) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a money amount into integer cents.
///
/// Strips thousands separators, then reads the first numeric token.
/// Sub-cent digits round half away from zero. Anything unparseable is `0`.
pub fn parse_amount(raw: &str) -> i64 {
    let cleaned = raw.replace(',', "");
    let Some(token) = numeric_token_regex().find(&cleaned) else {
        return 0;
    };
    let token = token.as_str();
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let Ok(whole) = whole.parse::<i64>() else {
        return 0;
    };
    let mut thousandths: i64 = 0;
    for (i, c) in fraction.chars().chain(std::iter::repeat('0')).take(3).enumerate() {
        let digit = i64::from(c.to_digit(10).unwrap_or(0));
        thousandths += digit * 10_i64.pow(2 - i as u32);
    }
    let mut cents = thousandths / 10;
    if thousandths % 10 >= 5 {
        cents += 1;
    }

    let Some(total) = whole.checked_mul(100).and_then(|w| w.checked_add(cents)) else {
        return 0;
    };
    if negative {
        -total
    } else {
        total
    }
}

/// Read a legacy boolean-ish flag (`1`, `true`, `yes`, `y`, `admin`).
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y" | "admin"
    )
}

/// Render integer cents as a decimal string (`1234` -> `"12.34"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Render a timestamp the way the store and staging tables expect it.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
