use chrono::NaiveDate;

use crate::criteria::TargetCategory;
use crate::fmt::Amount;

/// One product of the source usage table, with every usage row that names it.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub secondary_names: Vec<String>,
    /// Raw organic-certification indicator (a yes/no token or the authorized mentions text).
    pub mentions: String,
    pub active_substances: String,
    pub functions: String,
    pub usage_range: String,
    pub first_authorization: String,
    pub usages: Vec<UsageEntry>,
}

/// One authorized (crop, target) pairing. Numeric and date fields stay raw until normalization.
#[derive(Debug, Clone)]
pub struct UsageEntry {
    pub line: u64,
    pub usage_id: String,
    pub crop: String,
    pub target: String,
    pub status: String,
    pub dose: String,
    pub dose_unit: String,
    pub max_applications: String,
    pub pre_harvest_days: String,
    pub min_interval_days: String,
    pub decision_date: String,
    pub conditions: String,
}

/// A usage admitted by the category filter.
#[derive(Debug, Clone, Copy)]
pub struct UsageMatch<'a> {
    pub product: &'a ProductRecord,
    pub usage: &'a UsageEntry,
    pub target: TargetCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductFamily {
    Copper,
    Sulphur,
    Insecticide,
    Pheromones,
    Other,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 5] = [
        Self::Copper,
        Self::Sulphur,
        Self::Insecticide,
        Self::Pheromones,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Copper => "copper",
            Self::Sulphur => "sulphur",
            Self::Insecticide => "insecticide",
            Self::Pheromones => "pheromones",
            Self::Other => "other",
        }
    }

    /// Block title in the families sheet.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Copper => "CUIVRE",
            Self::Sulphur => "SOUFRE",
            Self::Insecticide => "INSECTICIDE",
            Self::Pheromones => "CONFUSION",
            Self::Other => "BIOCONTROLE",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.label() == label.trim())
    }
}

/// Cleaned row of the destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub product_id: String,
    pub product_name: String,
    pub secondary_names: Vec<String>,
    pub crop: String,
    pub target: TargetCategory,
    pub family: ProductFamily,
    pub active_substance: String,
    pub concentration: Option<Amount>,
    pub dose: Option<Amount>,
    pub dose_unit: String,
    pub active_per_ha: Option<Amount>,
    pub max_applications: Option<u32>,
    pub min_interval_days: Option<u32>,
    pub pre_harvest_days: Option<u32>,
    pub biocontrol: bool,
    pub insecticide: bool,
    pub others: String,
    pub first_authorization: Option<NaiveDate>,
    pub decision_date: Option<NaiveDate>,
}
