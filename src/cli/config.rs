use std::path::Path;

use crate::error::{AmmError, Result};
use crate::settings::{load_settings, save_settings, settings_path, Settings};

pub fn init(config: Option<&Path>, force: bool) -> Result<()> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if path.exists() && !force {
        return Err(AmmError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    save_settings(&Settings::default(), &path)?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

pub fn show(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let json = serde_json::to_string_pretty(&settings)
        .map_err(|e| AmmError::Config(e.to_string()))?;
    println!("{json}");
    Ok(())
}
