use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AmmError, Result};
use crate::settings::CriteriaSettings;

/// Canonical crop written to every output row.
pub const VINE: &str = "vine";

/// The four pest/disease categories a vine product must target to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCategory {
    Mildew,
    PowderyMildew,
    GrapeMoth,
    Leafhopper,
}

impl TargetCategory {
    pub const ALL: [TargetCategory; 4] = [
        Self::Mildew,
        Self::PowderyMildew,
        Self::GrapeMoth,
        Self::Leafhopper,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mildew => "mildew",
            Self::PowderyMildew => "powdery mildew",
            Self::GrapeMoth => "grape moth",
            Self::Leafhopper => "leafhopper",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label.trim())
    }
}

impl fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trim, case-fold and collapse internal whitespace. Matching is exact on the result.
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Static filter vocabulary, built once per run from settings.
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    crop_terms: BTreeSet<String>,
    target_terms: BTreeMap<String, TargetCategory>,
    organic_markers: Vec<String>,
    authorized_markers: Vec<String>,
    require_authorized: bool,
}

impl FilterCriteria {
    pub fn from_settings(settings: &CriteriaSettings) -> Result<Self> {
        let crop_terms: BTreeSet<String> = settings
            .crop_synonyms
            .iter()
            .map(|s| normalize_term(s))
            .filter(|s| !s.is_empty())
            .collect();
        if crop_terms.is_empty() {
            return Err(AmmError::Config("crop vocabulary is empty".to_string()));
        }

        let mut target_terms: BTreeMap<String, TargetCategory> = BTreeMap::new();
        for (synonym, category) in &settings.target_synonyms {
            let term = normalize_term(synonym);
            if term.is_empty() {
                continue;
            }
            match target_terms.get(&term) {
                Some(existing) if existing != category => {
                    return Err(AmmError::Config(format!(
                        "target synonym '{term}' maps to both '{existing}' and '{category}'"
                    )));
                }
                _ => {
                    target_terms.insert(term, *category);
                }
            }
        }
        for category in TargetCategory::ALL {
            if !target_terms.values().any(|c| *c == category) {
                return Err(AmmError::Config(format!(
                    "no synonym maps to target category '{category}'"
                )));
            }
        }

        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| normalize_term(s))
                .filter(|s| !s.is_empty())
                .collect()
        };
        let organic_markers = lower(&settings.organic_markers);
        if organic_markers.is_empty() {
            return Err(AmmError::Config("organic marker list is empty".to_string()));
        }

        Ok(Self {
            crop_terms,
            target_terms,
            organic_markers,
            authorized_markers: lower(&settings.authorized_markers),
            require_authorized: settings.require_authorized,
        })
    }

    pub fn matches_crop(&self, raw: &str) -> bool {
        self.crop_terms.contains(&normalize_term(raw))
    }

    pub fn target_category(&self, raw: &str) -> Option<TargetCategory> {
        self.target_terms.get(&normalize_term(raw)).copied()
    }

    /// Yes/no tokens are taken literally; free text is organic when it names an organic marker.
    pub fn is_organic(&self, raw: &str) -> bool {
        let value = normalize_term(raw);
        match value.as_str() {
            "oui" | "yes" | "true" | "1" | "o" | "y" => true,
            "non" | "no" | "false" | "0" | "n" | "" => false,
            _ => self.organic_markers.iter().any(|m| value.contains(m.as_str())),
        }
    }

    pub fn is_authorized(&self, status: &str) -> bool {
        if !self.require_authorized {
            return true;
        }
        let value = normalize_term(status);
        self.authorized_markers.iter().any(|m| value.contains(m.as_str()))
    }

    /// Crop name written to the output for every accepted crop term.
    pub fn canonical_crop(&self) -> &'static str {
        VINE
    }

    pub fn crop_terms(&self) -> impl Iterator<Item = &str> {
        self.crop_terms.iter().map(String::as_str)
    }

    pub fn target_terms(&self) -> impl Iterator<Item = (&str, TargetCategory)> {
        self.target_terms.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
