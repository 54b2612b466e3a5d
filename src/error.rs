use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmmError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Line {line}: {reason}")]
    RowParse { line: u64, reason: String },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AmmError {
    pub fn row(line: u64, reason: impl Into<String>) -> Self {
        Self::RowParse {
            line,
            reason: reason.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AmmError>;
