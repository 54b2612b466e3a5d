pub mod config;
pub mod run;
pub mod vocab;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::writer::Layout;

#[derive(Parser)]
#[command(
    name = "vigne-amm",
    version,
    about = "Organic vine product authorizations from the e-phy catalogue, as a French spreadsheet table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Settings file (default: ~/.config/vigne-amm/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the catalogue, filter it and write the table (the default).
    Run(RunArgs),
    /// Show the crop and target vocabulary used by the filter.
    Vocab,
    /// Manage the settings file.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Local e-phy zip archive
    #[arg(long, conflicts_with_all = ["archive_url", "page_url", "csv"])]
    pub archive: Option<PathBuf>,
    /// Archive URL, skipping link discovery
    #[arg(long = "archive-url", conflicts_with_all = ["page_url", "csv"])]
    pub archive_url: Option<String>,
    /// Dataset page to look for the archive link on
    #[arg(long = "page-url", conflicts_with = "csv")]
    pub page_url: Option<String>,
    /// Local usage table, already extracted
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Destination file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Output layout
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default settings file.
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings as JSON.
    Show,
}
