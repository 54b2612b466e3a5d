use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::criteria::FilterCriteria;
use crate::error::{AmmError, Result};
use crate::fetcher::{fetch, sha256_hex, Source};
use crate::filter::{filter_products, FilterStats};
use crate::loader::{load_table, SourceLocale};
use crate::models::OutputRow;
use crate::normalizer::normalize;
use crate::settings::{ColumnMap, Settings};
use crate::writer::{read_flat, write_table, Layout};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: Source,
    pub output: PathBuf,
    pub layout: Layout,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source: Source::from_settings(settings),
            output: PathBuf::from(&settings.output_path),
            layout: settings.layout,
        }
    }
}

/// Loader, filter and normalizer output for one source table.
#[derive(Debug)]
pub struct Processed {
    pub rows: Vec<OutputRow>,
    pub locale: SourceLocale,
    pub rows_read: usize,
    pub products: usize,
    pub matched: usize,
    pub filter: FilterStats,
    /// Records the loader could not read.
    pub skipped: Vec<AmmError>,
    /// Matched usages the normalizer could not convert.
    pub dropped: Vec<AmmError>,
    pub duplicates: usize,
}

/// Everything after the fetch step, without touching the filesystem.
pub fn process(data: &[u8], columns: &ColumnMap, criteria: &FilterCriteria) -> Result<Processed> {
    let loaded = load_table(data, columns)?;
    info!(
        rows = loaded.rows_read,
        products = loaded.products.len(),
        skipped = loaded.skipped.len(),
        "loaded usage table"
    );

    let filtered = filter_products(&loaded.products, criteria);
    debug!(stats = ?filtered.stats, "filter breakdown");
    info!(matched = filtered.matches.len(), "filtered organic vine usages");

    let normalized = normalize(&filtered.matches, criteria, loaded.locale.decimal);
    info!(
        rows = normalized.rows.len(),
        dropped = normalized.dropped.len(),
        "normalized rows"
    );

    Ok(Processed {
        matched: filtered.matches.len(),
        filter: filtered.stats,
        rows: normalized.rows,
        dropped: normalized.dropped,
        duplicates: normalized.duplicates,
        locale: loaded.locale,
        rows_read: loaded.rows_read,
        products: loaded.products.len(),
        skipped: loaded.skipped,
    })
}

#[derive(Debug)]
pub struct RunSummary {
    pub source_name: String,
    pub archive_checksum: Option<String>,
    pub rows_read: usize,
    pub products: usize,
    pub matched: usize,
    pub written: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub filter: FilterStats,
    pub output: PathBuf,
    pub layout: Layout,
    pub checksum: String,
}

impl RunSummary {
    /// Row-level problems across loading and normalization.
    pub fn warnings(&self) -> usize {
        self.skipped + self.dropped
    }
}

fn left_on_disk(path: &Path, reason: String) -> AmmError {
    AmmError::write(
        path,
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{reason}; the file was left on disk"),
        ),
    )
}

/// Read a freshly written flat table back and compare it with `rows`.
fn verify_flat(path: &Path, rows: &[OutputRow]) -> Result<usize> {
    let reread = read_flat(path).map_err(|e| left_on_disk(path, e.to_string()))?;
    if reread != rows {
        return Err(left_on_disk(path, "table does not read back as written".to_string()));
    }
    Ok(reread.len())
}

/// Fetch, load, filter, normalize and write. Row-level problems are counted in
/// the summary; anything else aborts the run before the output is touched.
pub fn run(settings: &Settings, criteria: &FilterCriteria, options: &RunOptions) -> Result<RunSummary> {
    let fetched = fetch(&options.source, settings)?;
    let processed = process(&fetched.bytes, &settings.columns, criteria)?;
    debug!(
        delimiter = %(processed.locale.delimiter as char),
        decimal = %processed.locale.decimal.as_char(),
        "source locale"
    );

    let bytes = write_table(&options.output, &processed.rows, options.layout)?;
    let checksum = sha256_hex(&bytes);
    info!(path = %options.output.display(), rows = processed.rows.len(), sha256 = %checksum, "wrote table");
    if options.layout == Layout::Flat {
        let verified = verify_flat(&options.output, &processed.rows)?;
        debug!(rows = verified, "output verified");
    }

    Ok(RunSummary {
        source_name: fetched.name,
        archive_checksum: fetched.archive_checksum,
        rows_read: processed.rows_read,
        products: processed.products,
        matched: processed.matched,
        written: processed.rows.len(),
        skipped: processed.skipped.len(),
        dropped: processed.dropped.len(),
        duplicates: processed.duplicates,
        filter: processed.filter,
        output: options.output.clone(),
        layout: options.layout,
        checksum,
    })
}
