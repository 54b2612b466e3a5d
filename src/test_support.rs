//! Fixtures shared by the unit tests: source rows in the e-phy usage-table shape.

use crate::settings::ColumnMap;

#[derive(Debug, Clone)]
pub struct SourceRow {
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

/// An authorized usage of product `id` with crop and target given separately.
pub fn row(id: &str, organic: &str, crop: &str, target: &str) -> SourceRow {
    SourceRow {
        product_id: id.to_string(),
        product_name: format!("produit {id}"),
        secondary_names: String::new(),
        mentions: organic.to_string(),
        active_substances: "cuivre de l'hydroxyde de cuivre (Hydroxyde de cuivre) 300.0 g/kg"
            .to_string(),
        functions: "Fongicide".to_string(),
        usage_range: "Professionnel".to_string(),
        first_authorization: "2015-03-02".to_string(),
        usage_id: format!("{crop}*Trt Part.Aer.*{target}"),
        usage_status: "Autorisé".to_string(),
        dose: "2.5".to_string(),
        dose_unit: "kg/ha".to_string(),
        max_applications: "6".to_string(),
        pre_harvest_days: "21".to_string(),
        min_interval_days: "7".to_string(),
        decision_date: "2021-06-30".to_string(),
        conditions: String::new(),
    }
}

fn values(r: &SourceRow) -> Vec<&str> {
    vec![
        &r.product_id,
        &r.product_name,
        &r.secondary_names,
        &r.mentions,
        &r.active_substances,
        &r.functions,
        &r.usage_range,
        &r.first_authorization,
        &r.usage_id,
        &r.usage_status,
        &r.dose,
        &r.dose_unit,
        &r.max_applications,
        &r.pre_harvest_days,
        &r.min_interval_days,
        &r.decision_date,
        &r.conditions,
    ]
}

pub fn headers() -> Vec<String> {
    let c = ColumnMap::default();
    vec![
        c.product_id,
        c.product_name,
        c.secondary_names,
        c.mentions,
        c.active_substances,
        c.functions,
        c.usage_range,
        c.first_authorization,
        c.usage_id,
        c.usage_status,
        c.dose,
        c.dose_unit,
        c.max_applications,
        c.pre_harvest_days,
        c.min_interval_days,
        c.decision_date,
        c.conditions,
    ]
}

/// Semicolon-separated source table with the default header.
pub fn csv_text(rows: &[SourceRow]) -> String {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());
    wtr.write_record(headers()).unwrap();
    for r in rows {
        wtr.write_record(values(r)).unwrap();
    }
    String::from_utf8(wtr.into_inner().unwrap()).unwrap()
}
