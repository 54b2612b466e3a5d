use std::path::Path;

use comfy_table::{Cell, Table};

use crate::criteria::{FilterCriteria, TargetCategory, VINE};
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let criteria = FilterCriteria::from_settings(&settings.criteria)?;

    let mut crops = Table::new();
    crops.set_header(vec!["Crop term", "Canonical"]);
    for term in criteria.crop_terms() {
        crops.add_row(vec![Cell::new(term), Cell::new(VINE)]);
    }
    println!("{crops}");

    let mut targets = Table::new();
    targets.set_header(vec!["Category", "Target terms"]);
    for category in TargetCategory::ALL {
        let terms: Vec<&str> = criteria
            .target_terms()
            .filter(|(_, c)| *c == category)
            .map(|(t, _)| t)
            .collect();
        targets.add_row(vec![Cell::new(category.label()), Cell::new(terms.join("\n"))]);
    }
    println!("{targets}");
    Ok(())
}
