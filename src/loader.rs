use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::criteria::normalize_term;
use crate::error::{AmmError, Result};
use crate::fmt::DecimalSep;
use crate::models::{ProductRecord, UsageEntry};
use crate::settings::ColumnMap;

const DELIMITER_CANDIDATES: [u8; 4] = [b';', b',', b'\t', b'|'];

static COMMA_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+,\d+$").unwrap());
static POINT_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());
static GROUPED_POINT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").unwrap());

/// Field and decimal separators found in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocale {
    pub delimiter: u8,
    pub decimal: DecimalSep,
}

#[derive(Debug)]
pub struct LoadResult {
    pub products: Vec<ProductRecord>,
    pub locale: SourceLocale,
    pub rows_read: usize,
    /// Records that could not be read; always `AmmError::RowParse`.
    pub skipped: Vec<AmmError>,
}

// ---------------------------------------------------------------------------
// Locale detection
// ---------------------------------------------------------------------------

/// Most frequent candidate separator in the header line; `;` when none appears.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = (b';', 0usize);
    for cand in DELIMITER_CANDIDATES {
        let count = header_line.bytes().filter(|b| *b == cand).count();
        if count > best.1 {
            best = (cand, count);
        }
    }
    best.0
}

pub fn detect_decimal<'a>(values: impl IntoIterator<Item = &'a str>, delimiter: u8) -> DecimalSep {
    if delimiter == b',' {
        return DecimalSep::Point;
    }
    let (mut comma, mut point, mut grouped) = (false, false, false);
    for v in values {
        let v = v.trim();
        if COMMA_DECIMAL.is_match(v) {
            comma = true;
        } else if GROUPED_POINT.is_match(v) {
            // `1.250` is a thousands grouping next to comma decimals
            grouped = true;
        } else if POINT_DECIMAL.is_match(v) {
            point = true;
        }
    }
    if grouped && !comma {
        point = true;
    }
    if comma && !point {
        DecimalSep::Comma
    } else {
        DecimalSep::Point
    }
}

/// `Vigne*Trt Part.Aer.*Mildiou(s)` → (`Vigne`, `Mildiou(s)`).
pub fn split_usage_id(raw: &str) -> (String, String) {
    let parts: Vec<&str> = raw.split('*').map(str::trim).collect();
    let crop = parts.first().copied().unwrap_or("").to_string();
    let target = if parts.len() > 1 {
        parts.last().copied().unwrap_or("").to_string()
    } else {
        String::new()
    };
    (crop, target)
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

struct ColumnIndex {
    product_id: usize,
    product_name: usize,
    mentions: usize,
    active_substances: usize,
    usage_id: usize,
    usage_status: usize,
    dose: usize,
    max_applications: usize,
    pre_harvest_days: usize,
    secondary_names: Option<usize>,
    functions: Option<usize>,
    usage_range: Option<usize>,
    first_authorization: Option<usize>,
    dose_unit: Option<usize>,
    min_interval_days: Option<usize>,
    decision_date: Option<usize>,
    conditions: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &ColumnMap) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_term).collect();
        let find = |name: &str| {
            let wanted = normalize_term(name);
            normalized.iter().position(|h| *h == wanted)
        };

        let mut missing = Vec::new();
        let mut required = |name: &str| match find(name) {
            Some(i) => i,
            None => {
                missing.push(name.to_string());
                0
            }
        };
        let product_id = required(&columns.product_id);
        let product_name = required(&columns.product_name);
        let mentions = required(&columns.mentions);
        let active_substances = required(&columns.active_substances);
        let usage_id = required(&columns.usage_id);
        let usage_status = required(&columns.usage_status);
        let dose = required(&columns.dose);
        let max_applications = required(&columns.max_applications);
        let pre_harvest_days = required(&columns.pre_harvest_days);
        if !missing.is_empty() {
            return Err(AmmError::Schema(format!(
                "missing column(s): {}",
                missing.join(", ")
            )));
        }

        let optional = |name: &str| {
            let found = find(name);
            if found.is_none() {
                debug!(column = name, "optional column absent");
            }
            found
        };
        Ok(Self {
            product_id,
            product_name,
            mentions,
            active_substances,
            usage_id,
            usage_status,
            dose,
            max_applications,
            pre_harvest_days,
            secondary_names: optional(&columns.secondary_names),
            functions: optional(&columns.functions),
            usage_range: optional(&columns.usage_range),
            first_authorization: optional(&columns.first_authorization),
            dose_unit: optional(&columns.dose_unit),
            min_interval_days: optional(&columns.min_interval_days),
            decision_date: optional(&columns.decision_date),
            conditions: optional(&columns.conditions),
        })
    }
}

fn field(record: &csv::StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or("").trim().to_string()
}

fn opt_field(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.map(|i| field(record, i)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// load_table
// ---------------------------------------------------------------------------

/// Parse the usage table and group its rows by product, in first-seen order.
pub fn load_table(data: &[u8], columns: &ColumnMap) -> Result<LoadResult> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let header_line = data
        .split(|b| *b == b'\n')
        .next()
        .map(|l| String::from_utf8_lossy(l).to_string())
        .unwrap_or_default();
    if header_line.trim().is_empty() {
        return Err(AmmError::Schema("source file has no header line".to_string()));
    }
    let delimiter = detect_delimiter(&header_line);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let headers = rdr.headers()?.clone();
    let idx = ColumnIndex::resolve(&headers, columns)?;

    let mut products: Vec<ProductRecord> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut skipped = Vec::new();
    let mut rows_read = 0usize;

    for (n, result) in rdr.records().enumerate() {
        rows_read += 1;
        // header is line 1
        let fallback_line = n as u64 + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                warn!(line, error = %e, "skipping unreadable row");
                skipped.push(AmmError::row(line, e.to_string()));
                continue;
            }
        };
        let line = record.position().map_or(fallback_line, |p| p.line());
        if record.len() != headers.len() {
            let reason = format!("expected {} fields, found {}", headers.len(), record.len());
            warn!(line, %reason, "skipping malformed row");
            skipped.push(AmmError::row(line, reason));
            continue;
        }
        let product_id = field(&record, idx.product_id);
        if product_id.is_empty() {
            warn!(line, "skipping row without product identifier");
            skipped.push(AmmError::row(line, "missing product identifier"));
            continue;
        }

        let usage_id = field(&record, idx.usage_id);
        let (crop, target) = split_usage_id(&usage_id);
        let usage = UsageEntry {
            line,
            usage_id,
            crop,
            target,
            status: field(&record, idx.usage_status),
            dose: field(&record, idx.dose),
            dose_unit: opt_field(&record, idx.dose_unit),
            max_applications: field(&record, idx.max_applications),
            pre_harvest_days: field(&record, idx.pre_harvest_days),
            min_interval_days: opt_field(&record, idx.min_interval_days),
            decision_date: opt_field(&record, idx.decision_date),
            conditions: opt_field(&record, idx.conditions),
        };

        match by_id.get(&product_id) {
            Some(&i) => products[i].usages.push(usage),
            None => {
                let secondary_names = opt_field(&record, idx.secondary_names)
                    .split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                by_id.insert(product_id.clone(), products.len());
                products.push(ProductRecord {
                    id: product_id,
                    name: field(&record, idx.product_name),
                    secondary_names,
                    mentions: field(&record, idx.mentions),
                    active_substances: field(&record, idx.active_substances),
                    functions: opt_field(&record, idx.functions),
                    usage_range: opt_field(&record, idx.usage_range),
                    first_authorization: opt_field(&record, idx.first_authorization),
                    usages: vec![usage],
                });
            }
        }
    }

    let decimal = detect_decimal(
        products.iter().flat_map(|p| {
            p.usages.iter().flat_map(|u| {
                [
                    u.dose.as_str(),
                    u.pre_harvest_days.as_str(),
                    u.max_applications.as_str(),
                ]
            })
        }),
        delimiter,
    );
    let locale = SourceLocale { delimiter, decimal };
    debug!(
        delimiter = %(delimiter as char),
        decimal = %decimal.as_char(),
        products = products.len(),
        "source table loaded"
    );

    Ok(LoadResult {
        products,
        locale,
        rows_read,
        skipped,
    })
}
