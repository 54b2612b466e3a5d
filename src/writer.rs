use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::criteria::{TargetCategory, VINE};
use crate::error::{AmmError, Result};
use crate::fmt::{flag, format_date, parse_amount, parse_count, parse_date, Amount, DecimalSep};
use crate::models::{OutputRow, ProductFamily};

pub const DELIMITER: u8 = b';';
pub const DECIMAL: DecimalSep = DecimalSep::Comma;

pub const HEADERS: [&str; 19] = [
    "Numéro AMM",
    "Spécialité commerciale",
    "Autres noms commerciaux",
    "Culture",
    "Cible",
    "Famille",
    "Matière active (M.A.)",
    "Concentration en M.A. (%)",
    "Dose homologuée",
    "Unité dose",
    "Kg / ha de M.A.",
    "Nombre de traitements max",
    "Intervalle entre applications (jours)",
    "Délai avant récolte (jours)",
    "Biocontrôle (1/0)",
    "Insecticide (1/0)",
    "Autre",
    "Date de première autorisation",
    "Date de décision",
];

/// A column of the families sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockColumn {
    Name,
    Substance,
    Other,
    Concentration,
    Dose,
    ActivePerHa,
    Biocontrol,
    Insecticide,
    MaxApplications,
}

impl BlockColumn {
    fn header(&self) -> &'static str {
        match self {
            Self::Name => "Spécialité commerciale",
            Self::Substance => "Matière active (M.A.)",
            Self::Other => "Autre",
            Self::Concentration => "Concentration en M.A. (%)",
            Self::Dose => "Dose homologuée (Kg ou L / ha)",
            Self::ActivePerHa => "Kg / ha de M.A.",
            Self::Biocontrol => "Biocontrôle (1/0)",
            Self::Insecticide => "Insecticide (1/0)",
            Self::MaxApplications => "Nombre de traitements max",
        }
    }

    fn cell(&self, row: &OutputRow, name: &str) -> String {
        match self {
            Self::Name => name.to_string(),
            Self::Substance => row.active_substance.clone(),
            Self::Other => row.others.clone(),
            Self::Concentration => amount_cell(&row.concentration),
            Self::Dose => amount_cell(&row.dose),
            Self::ActivePerHa => amount_cell(&row.active_per_ha),
            Self::Biocontrol => flag(row.biocontrol).to_string(),
            Self::Insecticide => flag(row.insecticide).to_string(),
            Self::MaxApplications => count_cell(&row.max_applications),
        }
    }
}

fn block_columns(family: ProductFamily) -> &'static [BlockColumn] {
    use BlockColumn::*;
    match family {
        ProductFamily::Copper => &[Name, Substance, Other, Concentration, Dose, ActivePerHa, MaxApplications],
        ProductFamily::Sulphur | ProductFamily::Insecticide => &[
            Name,
            Substance,
            Other,
            Concentration,
            Dose,
            ActivePerHa,
            Biocontrol,
            MaxApplications,
        ],
        ProductFamily::Pheromones => &[Name, Substance, Biocontrol],
        ProductFamily::Other => &[
            Name,
            Substance,
            Other,
            Concentration,
            Dose,
            ActivePerHa,
            Biocontrol,
            Insecticide,
            MaxApplications,
        ],
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One row per (product, crop, target)
    #[default]
    Flat,
    /// Side-by-side blocks per product family
    Families,
}

fn amount_cell(a: &Option<Amount>) -> String {
    a.map(|a| a.format(DECIMAL)).unwrap_or_default()
}

fn count_cell(n: &Option<u32>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}

fn date_cell(d: &Option<chrono::NaiveDate>) -> String {
    d.as_ref().map(format_date).unwrap_or_default()
}

fn flat_record(row: &OutputRow) -> Vec<String> {
    vec![
        row.product_id.clone(),
        row.product_name.clone(),
        row.secondary_names.join("|"),
        row.crop.clone(),
        row.target.label().to_string(),
        row.family.label().to_string(),
        row.active_substance.clone(),
        amount_cell(&row.concentration),
        amount_cell(&row.dose),
        row.dose_unit.clone(),
        amount_cell(&row.active_per_ha),
        count_cell(&row.max_applications),
        count_cell(&row.min_interval_days),
        count_cell(&row.pre_harvest_days),
        flag(row.biocontrol).to_string(),
        flag(row.insecticide).to_string(),
        row.others.clone(),
        date_cell(&row.first_authorization),
        date_cell(&row.decision_date),
    ]
}

/// One line per commercial name: the main name first, then each secondary name.
fn block_records(row: &OutputRow, columns: &[BlockColumn]) -> Vec<Vec<String>> {
    std::iter::once(&row.product_name)
        .chain(row.secondary_names.iter())
        .map(|name| columns.iter().map(|c| c.cell(row, name)).collect())
        .collect()
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(Vec::new())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| AmmError::Io(e.into_error()))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_flat(rows: &[OutputRow]) -> Result<Vec<u8>> {
    let mut wtr = writer();
    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.write_record(flat_record(row))?;
    }
    finish(wtr)
}

/// One block per family, in family order, separated by an empty column.
/// Line 1 holds the block titles, line 2 the block headers; shorter blocks
/// are padded with empty cells. Secondary commercial names get a line of
/// their own in the block.
pub fn render_families(rows: &[OutputRow]) -> Result<Vec<u8>> {
    let blocks: Vec<(ProductFamily, &[BlockColumn], Vec<Vec<String>>)> = ProductFamily::ALL
        .iter()
        .map(|family| {
            let columns = block_columns(*family);
            let records: Vec<Vec<String>> = rows
                .iter()
                .filter(|r| r.family == *family)
                .flat_map(|r| block_records(r, columns))
                .collect();
            (*family, columns, records)
        })
        .collect();
    let height = blocks.iter().map(|(_, _, r)| r.len()).max().unwrap_or(0);

    let mut lines: Vec<Vec<String>> = vec![Vec::new(); height + 2];
    for (i, (family, columns, records)) in blocks.iter().enumerate() {
        if i > 0 {
            for line in lines.iter_mut() {
                line.push(String::new());
            }
        }
        let width = columns.len();
        let mut title = vec![String::new(); width];
        title[0] = family.title().to_string();
        lines[0].extend(title);
        lines[1].extend(columns.iter().map(|c| c.header().to_string()));
        for (n, line) in lines.iter_mut().skip(2).enumerate() {
            match records.get(n) {
                Some(rec) => line.extend(rec.iter().cloned()),
                None => line.extend(std::iter::repeat(String::new()).take(width)),
            }
        }
    }

    let mut wtr = writer();
    for line in &lines {
        wtr.write_record(line)?;
    }
    finish(wtr)
}

pub fn render(rows: &[OutputRow], layout: Layout) -> Result<Vec<u8>> {
    match layout {
        Layout::Flat => render_flat(rows),
        Layout::Families => render_families(rows),
    }
}

/// Write the table to `path`, creating parent directories. Returns the bytes written.
pub fn write_table(path: &Path, rows: &[OutputRow], layout: Layout) -> Result<Vec<u8>> {
    let bytes = render(rows, layout)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AmmError::write(path, e))?;
    }
    std::fs::write(path, &bytes).map_err(|e| AmmError::write(path, e))?;
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Reading back
// ---------------------------------------------------------------------------

fn cell_amount(raw: &str, line: u64, name: &str) -> Result<Option<Amount>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_amount(raw, DECIMAL)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("bad {name} '{raw}'")))
}

fn cell_count(raw: &str, line: u64, name: &str) -> Result<Option<u32>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_count(raw, DECIMAL)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("bad {name} '{raw}'")))
}

fn cell_date(raw: &str, line: u64, name: &str) -> Result<Option<chrono::NaiveDate>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(raw)
        .map(Some)
        .ok_or_else(|| AmmError::row(line, format!("bad {name} '{raw}'")))
}

fn cell_flag(raw: &str, line: u64, name: &str) -> Result<bool> {
    match raw {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(AmmError::row(line, format!("bad {name} flag '{raw}'"))),
    }
}

/// Parse a flat-layout file back into rows.
pub fn read_flat(path: &Path) -> Result<Vec<OutputRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;

    let headers = rdr.headers()?.clone();
    if headers.iter().ne(HEADERS.iter().copied()) {
        return Err(AmmError::Schema(format!(
            "{} is not a flat output table",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let c = |i: usize| record.get(i).unwrap_or("");

        let target = TargetCategory::from_label(c(4))
            .ok_or_else(|| AmmError::row(line, format!("unknown target '{}'", c(4))))?;
        let family = ProductFamily::from_label(c(5))
            .ok_or_else(|| AmmError::row(line, format!("unknown family '{}'", c(5))))?;
        if c(3) != VINE {
            return Err(AmmError::row(line, format!("unexpected crop '{}'", c(3))));
        }

        rows.push(OutputRow {
            product_id: c(0).to_string(),
            product_name: c(1).to_string(),
            secondary_names: c(2)
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            crop: c(3).to_string(),
            target,
            family,
            active_substance: c(6).to_string(),
            concentration: cell_amount(c(7), line, "concentration")?,
            dose: cell_amount(c(8), line, "dose")?,
            dose_unit: c(9).to_string(),
            active_per_ha: cell_amount(c(10), line, "active matter per ha")?,
            max_applications: cell_count(c(11), line, "max applications")?,
            min_interval_days: cell_count(c(12), line, "application interval")?,
            pre_harvest_days: cell_count(c(13), line, "pre-harvest interval")?,
            biocontrol: cell_flag(c(14), line, "biocontrol")?,
            insecticide: cell_flag(c(15), line, "insecticide")?,
            others: c(16).to_string(),
            first_authorization: cell_date(c(17), line, "authorization date")?,
            decision_date: cell_date(c(18), line, "decision date")?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample(id: &str, target: TargetCategory, family: ProductFamily) -> OutputRow {
        OutputRow {
            product_id: id.to_string(),
            product_name: format!("PRODUIT {id}"),
            secondary_names: vec!["ALIAS UN".to_string(), "ALIAS DEUX".to_string()],
            crop: VINE.to_string(),
            target,
            family,
            active_substance: "cuivre de l'hydroxyde de cuivre".to_string(),
            concentration: Some(Amount::new(30.0, 2)),
            dose: Some(Amount::new(12.5, 1)),
            dose_unit: "kg/ha".to_string(),
            active_per_ha: Some(Amount::new(3.8, 1)),
            max_applications: Some(6),
            min_interval_days: None,
            pre_harvest_days: Some(21),
            biocontrol: false,
            insecticide: false,
            others: "badigeon".to_string(),
            first_authorization: NaiveDate::from_ymd_opt(2015, 3, 2),
            decision_date: None,
        }
    }

    #[test]
    fn test_flat_header_and_locale() {
        let bytes = render_flat(&[sample("1", TargetCategory::Mildew, ProductFamily::Copper)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADERS.join(";"));
        assert_eq!(
            lines.next().unwrap(),
            "1;PRODUIT 1;ALIAS UN|ALIAS DEUX;vine;mildew;copper;cuivre de l'hydroxyde de cuivre;30,00;12,5;kg/ha;3,8;6;;21;0;0;badigeon;02/03/2015;"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let text = String::from_utf8(render_flat(&[]).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("amm.csv");
        let rows = vec![
            sample("1", TargetCategory::Mildew, ProductFamily::Copper),
            sample("2", TargetCategory::GrapeMoth, ProductFamily::Insecticide),
        ];
        let bytes = write_table(&path, &rows, Layout::Flat).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert_eq!(read_flat(&path).unwrap(), rows);
    }

    #[test]
    fn test_read_flat_rejects_other_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a;b\n1;2\n").unwrap();
        assert!(matches!(read_flat(&path), Err(AmmError::Schema(_))));
    }

    #[test]
    fn test_write_to_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = write_table(dir.path(), &[], Layout::Flat).unwrap_err();
        assert!(matches!(err, AmmError::Write { .. }));
    }

    fn block_width(family: ProductFamily) -> usize {
        block_columns(family).len()
    }

    fn families_lines(rows: &[OutputRow]) -> Vec<Vec<String>> {
        let text = String::from_utf8(render_families(rows).unwrap()).unwrap();
        text.lines()
            .map(|l| l.split(';').map(String::from).collect())
            .collect()
    }

    #[test]
    fn test_families_blocks_are_padded() {
        let mut copper = sample("2", TargetCategory::Mildew, ProductFamily::Copper);
        copper.secondary_names.clear();
        let rows = vec![
            sample("1", TargetCategory::Mildew, ProductFamily::Copper),
            copper,
            sample("3", TargetCategory::PowderyMildew, ProductFamily::Sulphur),
        ];
        let lines = families_lines(&rows);
        // copper: 1 + 2 aliases + 1, sulphur: 1 + 2 aliases
        assert_eq!(lines.len(), 2 + 4);

        let width: usize = ProductFamily::ALL.iter().map(|f| block_width(*f)).sum::<usize>() + 4;
        for line in &lines {
            assert_eq!(line.len(), width);
        }
        let titles: Vec<&str> = lines[0].iter().map(String::as_str).filter(|c| !c.is_empty()).collect();
        assert_eq!(titles, vec!["CUIVRE", "SOUFRE", "INSECTICIDE", "CONFUSION", "BIOCONTROLE"]);

        let last = &lines[5];
        assert_eq!(last[0], "PRODUIT 2");
        // sulphur block has three lines only
        let sulphur_start = block_width(ProductFamily::Copper) + 1;
        assert!(last[sulphur_start..].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_families_block_headers() {
        let lines = families_lines(&[]);
        assert_eq!(lines.len(), 2);
        let headers = &lines[1];
        let mut blocks = Vec::new();
        let mut start = 0;
        for family in ProductFamily::ALL {
            let end = start + block_width(family);
            blocks.push(headers[start..end].join(";"));
            start = end + 1;
        }
        assert_eq!(
            blocks,
            vec![
                "Spécialité commerciale;Matière active (M.A.);Autre;Concentration en M.A. (%);Dose homologuée (Kg ou L / ha);Kg / ha de M.A.;Nombre de traitements max",
                "Spécialité commerciale;Matière active (M.A.);Autre;Concentration en M.A. (%);Dose homologuée (Kg ou L / ha);Kg / ha de M.A.;Biocontrôle (1/0);Nombre de traitements max",
                "Spécialité commerciale;Matière active (M.A.);Autre;Concentration en M.A. (%);Dose homologuée (Kg ou L / ha);Kg / ha de M.A.;Biocontrôle (1/0);Nombre de traitements max",
                "Spécialité commerciale;Matière active (M.A.);Biocontrôle (1/0)",
                "Spécialité commerciale;Matière active (M.A.);Autre;Concentration en M.A. (%);Dose homologuée (Kg ou L / ha);Kg / ha de M.A.;Biocontrôle (1/0);Insecticide (1/0);Nombre de traitements max",
            ]
        );
    }

    #[test]
    fn test_families_sulphur_row_cells() {
        let mut row = sample("7", TargetCategory::PowderyMildew, ProductFamily::Sulphur);
        row.product_name = "BOUILLIE".to_string();
        row.max_applications = Some(8);
        row.biocontrol = true;
        let lines = families_lines(&[row]);
        let start = block_width(ProductFamily::Copper) + 1;
        let end = start + block_width(ProductFamily::Sulphur);
        assert_eq!(
            lines[2][start..end].join(";"),
            "BOUILLIE;cuivre de l'hydroxyde de cuivre;badigeon;30,00;12,5;3,8;1;8"
        );
    }

    #[test]
    fn test_families_secondary_names_get_own_lines() {
        let mut row = sample("7", TargetCategory::PowderyMildew, ProductFamily::Sulphur);
        row.product_name = "BOUILLIE".to_string();
        let lines = families_lines(&[row]);
        assert_eq!(lines.len(), 5);
        let start = block_width(ProductFamily::Copper) + 1;
        let names: Vec<&str> = lines[2..].iter().map(|l| l[start].as_str()).collect();
        assert_eq!(names, vec!["BOUILLIE", "ALIAS UN", "ALIAS DEUX"]);
        for line in &lines[2..] {
            assert_eq!(line[start + 2], "badigeon");
            assert_eq!(line[start + 4], "12,5");
        }
    }
}
