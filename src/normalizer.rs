use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

use crate::criteria::{FilterCriteria, TargetCategory};
use crate::error::{AmmError, Result};
use crate::fmt::{parse_amount, parse_count, parse_date, Amount, DecimalSep};
use crate::models::{OutputRow, ProductFamily, ProductRecord, UsageMatch};

static CONCENTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(%|g\s*/\s*kg|g\s*/\s*l)").unwrap()
});

const PHEROMONE_LABEL: &str = "(Straight Chain Lepidopteran Pheromones)";

struct FamilyRule {
    family: ProductFamily,
    substance_markers: &'static [&'static str],
    function_marker: Option<&'static str>,
}

/// First match wins.
const FAMILY_RULES: &[FamilyRule] = &[
    FamilyRule {
        family: ProductFamily::Copper,
        substance_markers: &["cuivre"],
        function_marker: None,
    },
    FamilyRule {
        family: ProductFamily::Sulphur,
        substance_markers: &["soufre", "sulphur"],
        function_marker: None,
    },
    FamilyRule {
        family: ProductFamily::Insecticide,
        substance_markers: &["spinosad", "bacillus", "pyréthrines"],
        function_marker: Some("insecticide"),
    },
    FamilyRule {
        family: ProductFamily::Pheromones,
        substance_markers: &["pheromones", "phéromones"],
        function_marker: None,
    },
];

pub struct NormalizeResult {
    pub rows: Vec<OutputRow>,
    /// Rows whose numbers or dates did not parse; always `AmmError::RowParse`.
    pub dropped: Vec<AmmError>,
    pub duplicates: usize,
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Uppercase with internal whitespace collapsed.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn classify(substances: &str, functions: &str) -> ProductFamily {
    let substances = substances.to_lowercase();
    let functions = functions.to_lowercase();
    FAMILY_RULES
        .iter()
        .find(|rule| {
            rule.substance_markers.iter().any(|m| substances.contains(m))
                && rule.function_marker.map_or(true, |f| functions.contains(f))
        })
        .map_or(ProductFamily::Other, |rule| rule.family)
}

/// Name of the first active substance: the text before its parenthesised
/// label, or before its concentration when there is no label.
pub fn active_substance(substances: &str, family: ProductFamily) -> String {
    if family == ProductFamily::Pheromones {
        return substances
            .split('|')
            .map(|s| s.replace(PHEROMONE_LABEL, ""))
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" + ");
    }
    let first = substances.split('|').next().unwrap_or("");
    let name = match first.find('(') {
        Some(i) => &first[..i],
        None => match CONCENTRATION.find(first) {
            Some(m) => &first[..m.start()],
            None => first,
        },
    };
    name.trim().to_string()
}

/// Concentration of the first active substance, in percent.
/// `N %` stays N; `N g/kg` and `N g/L` become N/10.
pub fn concentration(substances: &str) -> Option<Amount> {
    let first = substances.split('|').next().unwrap_or("");
    let tail = match first.find(')') {
        Some(i) => &first[i + 1..],
        None => first,
    };
    let caps = CONCENTRATION.captures(tail)?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    let percent = if caps[2].contains('%') {
        value
    } else {
        value / 10.0
    };
    Some(Amount::rounded(percent, 2))
}

fn is_biocontrol(mentions: &str) -> bool {
    let m = mentions.to_lowercase();
    m.contains("biocontrôle") || m.contains("biocontrole")
}

fn others(conditions: &str, usage_range: &str) -> String {
    let mut notes = Vec::new();
    if conditions.to_lowercase().contains("badigeon") {
        notes.push("badigeon");
    }
    if usage_range.to_lowercase().contains("jardin") {
        notes.push("Jardin autorisé");
    }
    notes.join("|")
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

fn opt_amount(raw: &str, name: &str, sep: DecimalSep, line: u64) -> Result<Option<Amount>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_amount(raw, sep)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("unparseable {name} '{raw}'")))
}

fn opt_count(raw: &str, name: &str, sep: DecimalSep, line: u64) -> Result<Option<u32>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_count(raw, sep)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("unparseable {name} '{raw}'")))
}

fn opt_date(raw: &str, name: &str, line: u64) -> Result<Option<NaiveDate>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_date(raw)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("unparseable {name} '{raw}'")))
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

pub fn normalize_match(
    m: &UsageMatch<'_>,
    criteria: &FilterCriteria,
    sep: DecimalSep,
) -> Result<OutputRow> {
    let ProductRecord {
        id,
        name,
        secondary_names,
        mentions,
        active_substances,
        functions,
        usage_range,
        first_authorization,
        ..
    } = m.product;
    let usage = m.usage;
    let line = usage.line;

    let dose = opt_amount(&usage.dose, "dose", sep, line)?;
    let max_applications = opt_count(&usage.max_applications, "max applications", sep, line)?;
    let pre_harvest_days = opt_count(&usage.pre_harvest_days, "pre-harvest interval", sep, line)?;
    let min_interval_days = opt_count(&usage.min_interval_days, "application interval", sep, line)?;
    let first_authorization = opt_date(first_authorization, "authorization date", line)?;
    let decision_date = opt_date(&usage.decision_date, "decision date", line)?;

    let family = classify(active_substances, functions);
    let concentration = match family {
        ProductFamily::Pheromones => None,
        ProductFamily::Insecticide if active_substances.to_lowercase().contains("bacillus") => {
            Some(Amount::new(0.0, 2))
        }
        _ => concentration(active_substances),
    };
    let per_ha_scale = if family == ProductFamily::Insecticide { 3 } else { 1 };
    let active_per_ha = match (concentration, dose) {
        (Some(c), Some(d)) => Some(Amount::rounded(c.value() * d.value() / 100.0, per_ha_scale)),
        _ => None,
    };

    Ok(OutputRow {
        product_id: id.clone(),
        product_name: clean_name(name),
        secondary_names: secondary_names.iter().map(|s| clean_name(s)).collect(),
        crop: criteria.canonical_crop().to_string(),
        target: m.target,
        family,
        active_substance: active_substance(active_substances, family),
        concentration,
        dose,
        dose_unit: usage.dose_unit.trim().to_string(),
        active_per_ha,
        max_applications,
        min_interval_days,
        pre_harvest_days,
        biocontrol: is_biocontrol(mentions),
        insecticide: functions.to_lowercase().contains("insecticide"),
        others: others(&usage.conditions, usage_range),
        first_authorization,
        decision_date,
    })
}

/// Turn filtered usages into output rows. Unparseable rows are dropped with a
/// warning; rows repeating a (product, crop, target) triple are dropped silently.
pub fn normalize(
    matches: &[UsageMatch<'_>],
    criteria: &FilterCriteria,
    sep: DecimalSep,
) -> NormalizeResult {
    let mut rows = Vec::new();
    let mut dropped = Vec::new();
    let mut duplicates = 0usize;
    let mut seen: HashSet<(String, String, TargetCategory)> = HashSet::new();

    for m in matches {
        let row = match normalize_match(m, criteria, sep) {
            Ok(row) => row,
            Err(e) => {
                warn!(product = %m.product.id, error = %e, "dropping row");
                dropped.push(e);
                continue;
            }
        };
        let key = (row.product_id.clone(), row.crop.clone(), row.target);
        if !seen.insert(key) {
            duplicates += 1;
            continue;
        }
        rows.push(row);
    }

    NormalizeResult {
        rows,
        dropped,
        duplicates,
    }
}
