use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::criteria::TargetCategory;
use crate::error::{AmmError, Result};
use crate::writer::Layout;

pub const DATASET_PAGE_URL: &str = "https://www.data.gouv.fr/fr/datasets/donnees-ouvertes-du-catalogue-e-phy-des-produits-phytopharmaceutiques-matieres-fertilisantes-et-supports-de-culture-adjuvants-produits-mixtes-et-melanges/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_dataset_page_url")]
    pub dataset_page_url: String,
    /// Skips link discovery on the dataset page when set.
    #[serde(default)]
    pub archive_url: Option<String>,
    #[serde(default = "default_archive_entry")]
    pub archive_entry: String,
    #[serde(default = "default_archive_entry_prefix")]
    pub archive_entry_prefix: String,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub columns: ColumnMap,
    #[serde(default)]
    pub criteria: CriteriaSettings,
}

fn default_dataset_page_url() -> String {
    DATASET_PAGE_URL.to_string()
}

fn default_archive_entry() -> String {
    "usages_des_produits_autorises_v3_utf8.csv".to_string()
}

fn default_archive_entry_prefix() -> String {
    "usages_des_produits_autorises".to_string()
}

fn default_output_path() -> String {
    "amm_vigne_bio.csv".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_page_url: default_dataset_page_url(),
            archive_url: None,
            archive_entry: default_archive_entry(),
            archive_entry_prefix: default_archive_entry_prefix(),
            output_path: default_output_path(),
            layout: Layout::default(),
            columns: ColumnMap::default(),
            criteria: CriteriaSettings::default(),
        }
    }
}

/// Header names of the source usage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub product_id: String,
    pub product_name: String,
    pub secondary_names: String,
    pub mentions: String,
    pub active_substances: String,
    pub functions: String,
    pub usage_range: String,
    pub first_authorization: String,
    pub usage_id: String,
    pub usage_status: String,
    pub dose: String,
    pub dose_unit: String,
    pub max_applications: String,
    pub pre_harvest_days: String,
    pub min_interval_days: String,
    pub decision_date: String,
    pub conditions: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            product_id: "numero AMM".to_string(),
            product_name: "nom produit".to_string(),
            secondary_names: "seconds noms commerciaux".to_string(),
            mentions: "mentions autorisees".to_string(),
            active_substances: "Substances actives".to_string(),
            functions: "fonctions".to_string(),
            usage_range: "gamme usage".to_string(),
            first_authorization: "Date de première autorisation".to_string(),
            usage_id: "identifiant usage".to_string(),
            usage_status: "etat usage".to_string(),
            dose: "dose retenue".to_string(),
            dose_unit: "dose retenue unite".to_string(),
            max_applications: "nombre max d'application".to_string(),
            pre_harvest_days: "delai avant recolte jour".to_string(),
            min_interval_days: "intervalle minimum entre applications (jour)".to_string(),
            decision_date: "date decision".to_string(),
            conditions: "condition emploi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaSettings {
    pub crop_synonyms: Vec<String>,
    pub target_synonyms: BTreeMap<String, TargetCategory>,
    pub organic_markers: Vec<String>,
    pub authorized_markers: Vec<String>,
    pub require_authorized: bool,
}

const CROP_SYNONYMS: &[&str] = &[
    "Vigne",
    "Vignes",
    "Vigne(s)",
    "Vigne de cuve",
    "Vigne (raisin de cuve)",
    "Vigne raisin de table",
    "Raisin de table",
];

const TARGET_SYNONYMS: &[(&str, TargetCategory)] = &[
    ("Mildiou", TargetCategory::Mildew),
    ("Mildiou(s)", TargetCategory::Mildew),
    ("Mildious", TargetCategory::Mildew),
    ("Mildiou de la vigne", TargetCategory::Mildew),
    ("Oïdium", TargetCategory::PowderyMildew),
    ("Oidium", TargetCategory::PowderyMildew),
    ("Oïdium(s)", TargetCategory::PowderyMildew),
    ("Oidium(s)", TargetCategory::PowderyMildew),
    ("Oïdiums", TargetCategory::PowderyMildew),
    ("Oïdium de la vigne", TargetCategory::PowderyMildew),
    ("Tordeuses de la grappe", TargetCategory::GrapeMoth),
    ("Tordeuse de la grappe", TargetCategory::GrapeMoth),
    ("Tordeuse(s) de la grappe", TargetCategory::GrapeMoth),
    ("Vers de la grappe", TargetCategory::GrapeMoth),
    ("Eudémis", TargetCategory::GrapeMoth),
    ("Eudemis", TargetCategory::GrapeMoth),
    ("Cochylis", TargetCategory::GrapeMoth),
    ("Cicadelles", TargetCategory::Leafhopper),
    ("Cicadelle", TargetCategory::Leafhopper),
    ("Cicadelle(s)", TargetCategory::Leafhopper),
    ("Cicadelles vertes", TargetCategory::Leafhopper),
    ("Cicadelle verte", TargetCategory::Leafhopper),
    ("Cicadelle de la flavescence dorée", TargetCategory::Leafhopper),
    ("Cicadelles de la flavescence dorée", TargetCategory::Leafhopper),
    ("Cicadelles des grillures", TargetCategory::Leafhopper),
];

impl Default for CriteriaSettings {
    fn default() -> Self {
        Self {
            crop_synonyms: CROP_SYNONYMS.iter().map(|s| s.to_string()).collect(),
            target_synonyms: TARGET_SYNONYMS
                .iter()
                .map(|(s, c)| (s.to_string(), *c))
                .collect(),
            organic_markers: vec![
                "agriculture biologique".to_string(),
                "production biologique".to_string(),
            ],
            authorized_markers: vec!["autorisé".to_string()],
            require_authorized: true,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("vigne-amm")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Load settings from `explicit`, else from the default location, else built-in defaults.
/// A file that exists but does not parse is an error either way.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(AmmError::Config(format!(
                    "settings file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => {
            let p = settings_path();
            if !p.exists() {
                return Ok(Settings::default());
            }
            p
        }
    };
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| AmmError::Config(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AmmError::Config(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
