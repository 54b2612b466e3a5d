use std::path::Path;

use colored::Colorize;

use crate::cli::RunArgs;
use crate::criteria::FilterCriteria;
use crate::error::Result;
use crate::fetcher::Source;
use crate::pipeline::{self, RunOptions, RunSummary};
use crate::settings::{load_settings, Settings};

fn options(settings: &Settings, args: RunArgs) -> RunOptions {
    let mut options = RunOptions::from_settings(settings);
    if let Some(path) = args.archive {
        options.source = Source::Archive(path);
    } else if let Some(url) = args.archive_url {
        options.source = Source::ArchiveUrl(url);
    } else if let Some(url) = args.page_url {
        options.source = Source::DatasetPage(url);
    } else if let Some(path) = args.csv {
        options.source = Source::Csv(path);
    }
    if let Some(output) = args.output {
        options.output = output;
    }
    if let Some(layout) = args.layout {
        options.layout = layout;
    }
    options
}

fn print_summary(summary: &RunSummary) {
    println!("{} {}", "Source:".bold(), summary.source_name);
    if let Some(checksum) = &summary.archive_checksum {
        println!("  archive sha256 {checksum}");
    }
    println!(
        "{} rows read, {} products, {} usages matched",
        summary.rows_read, summary.products, summary.matched
    );
    println!(
        "  excluded: {} not organic, {} other crop, {} other target, {} not authorized, {} duplicates",
        summary.filter.not_organic,
        summary.filter.other_crop,
        summary.filter.other_target,
        summary.filter.not_authorized,
        summary.filter.duplicates + summary.duplicates,
    );
    if summary.warnings() > 0 {
        println!(
            "{}",
            format!(
                "{} rows skipped ({} unreadable, {} unparseable)",
                summary.warnings(),
                summary.skipped,
                summary.dropped
            )
            .yellow()
        );
    }
    let written = format!("{} rows written", summary.written);
    println!(
        "{} to {} ({:?} layout)",
        written.green().bold(),
        summary.output.display(),
        summary.layout
    );
    println!("sha256 {}", summary.checksum);
}

pub fn run(config: Option<&Path>, args: RunArgs) -> Result<()> {
    let settings = load_settings(config)?;
    let criteria = FilterCriteria::from_settings(&settings.criteria)?;
    let options = options(&settings, args);
    let summary = pipeline::run(&settings, &criteria, &options)?;
    print_summary(&summary);
    Ok(())
}
