//! Defensive per-field coercion.
//!
//! Every function takes whatever the backend sent (or nothing) and returns
//! `None` rather than failing. A value that parses to zero is `Some(0)`; a
//! value that does not parse is `None`, never zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Trimmed non-empty string; numbers and booleans are rendered.
pub fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Finite float from a JSON number or a (possibly locale-formatted) string.
pub fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Integer, truncating any fractional part. Out-of-range for `T` is `None`.
pub fn integer<T: TryFrom<i64>>(v: Option<&Value>) -> Option<T> {
    let n = match v? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        },
        Value::String(s) => parse_number(s).map(|f| f.trunc() as i64),
        _ => None,
    }?;
    T::try_from(n).ok()
}

/// Boolean from a bool, 0/1, or common yes/no spellings.
pub fn flag(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "si" | "sí" | "s" => Some(true),
            "false" | "0" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Calendar date from ISO/RFC 3339, `dd/mm/yyyy`, epoch seconds or millis,
/// or a `{"seconds": n}` timestamp object.
pub fn date(v: Option<&Value>) -> Option<NaiveDate> {
    match v? {
        Value::String(s) => parse_date(s.trim()),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::Object(obj) => obj.get("seconds").and_then(|s| match s {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|d| d.date_naive()),
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok().map(|dt| dt.date()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        })
}

fn from_epoch(n: i64) -> Option<NaiveDate> {
    // Anything past ~1973 in milliseconds is far beyond year 5000 in seconds.
    let dt = if n.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }?;
    Some(dt.date_naive())
}

const UNIT_SUFFIXES: &[&str] = &["€", "eur", "m²", "m2", "%"];

/// Parse a number that may carry a currency/unit and either `.` or `,` as
/// decimal separator.
///
/// With both separators present the last one is the decimal point
/// (`1.234,56` and `1,234.56` are both 1234.56). A separator that repeats is
/// a thousands grouping. A single separator followed by exactly three digits
/// groups thousands (`150.000` is 150000) unless the integer part is zero;
/// otherwise it is the decimal point (`85,5`, `150000.50`).
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect::<String>()
        .to_lowercase();
    if let Some(rest) = s.strip_prefix('€') {
        s = rest.to_string();
    }
    for suffix in UNIT_SUFFIXES {
        if let Some(rest) = s.strip_suffix(suffix) {
            s = rest.to_string();
            break;
        }
    }
    if s.is_empty() {
        return None;
    }

    let dots = s.matches('.').count();
    let commas = s.matches(',').count();
    let normalized = match (dots, commas) {
        (0, 0) => s,
        (1, 0) if groups_thousands(&s, '.') => s.replace('.', ""),
        (1, 0) => s,
        (_, 0) => s.replace('.', ""),
        (0, 1) if groups_thousands(&s, ',') => s.replace(',', ""),
        (0, 1) => s.replace(',', "."),
        (0, _) => s.replace(',', ""),
        _ => {
            if s.rfind(',') > s.rfind('.') {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `s` holds exactly one `sep`: is it a thousands separator?
fn groups_thousands(s: &str, sep: char) -> bool {
    let Some((int, frac)) = s.split_once(sep) else {
        return false;
    };
    let int = int.trim_start_matches(['-', '+']);
    frac.len() == 3
        && frac.bytes().all(|b| b.is_ascii_digit())
        && !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && !int.trim_start_matches('0').is_empty()
}
