use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Destination date format (French spreadsheet).
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

static POINT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?(\d{1,3}(?:[, \x{a0}\x{202f}]\d{3})+|\d+)(?:\.(\d+))?$").unwrap()
});
static COMMA_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?(\d{1,3}(?:[. \x{a0}\x{202f}]\d{3})+|\d+)(?:,(\d+))?$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalSep {
    Point,
    Comma,
}

impl DecimalSep {
    pub fn as_char(&self) -> char {
        match self {
            Self::Point => '.',
            Self::Comma => ',',
        }
    }
}

/// A decimal value that remembers how many fractional digits it carries,
/// so reformatting never adds or loses digits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amount {
    value: f64,
    scale: usize,
}

impl Amount {
    pub fn new(value: f64, scale: usize) -> Self {
        // no "-0,0" in the output
        let value = if value == 0.0 { 0.0 } else { value };
        Self { value, scale }
    }

    pub fn rounded(value: f64, scale: usize) -> Self {
        let factor = 10f64.powi(scale as i32);
        Self::new((value * factor).round() / factor, scale)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Render with the given decimal separator and no thousands grouping.
    pub fn format(&self, sep: DecimalSep) -> String {
        let s = format!("{:.*}", self.scale, self.value);
        match sep {
            DecimalSep::Point => s,
            DecimalSep::Comma => s.replacen('.', ",", 1),
        }
    }
}

/// Parse a number written with `sep` as decimal separator. Thousands groupings
/// (the other separator, or spaces) are accepted and dropped.
pub fn parse_amount(raw: &str, sep: DecimalSep) -> Option<Amount> {
    let re = match sep {
        DecimalSep::Point => &*POINT_NUMBER,
        DecimalSep::Comma => &*COMMA_NUMBER,
    };
    let caps = re.captures(raw.trim())?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let int: String = caps[2].chars().filter(|c| c.is_ascii_digit()).collect();
    let frac = caps.get(3).map_or("", |m| m.as_str());
    let value: f64 = if frac.is_empty() {
        format!("{sign}{int}").parse().ok()?
    } else {
        format!("{sign}{int}.{frac}").parse().ok()?
    };
    Some(Amount::new(value, frac.len()))
}

/// Parse a non-negative whole count; "3" and "3.0" are both accepted.
pub fn parse_count(raw: &str, sep: DecimalSep) -> Option<u32> {
    let amount = parse_amount(raw, sep)?;
    let v = amount.value();
    if v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64 {
        return None;
    }
    Some(v as u32)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
