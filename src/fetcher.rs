use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{AmmError, Result};
use crate::settings::Settings;

const ARCHIVE_MARKER: &str = "-utf8.zip";
const USER_AGENT: &str = concat!("vigne-amm/", env!("CARGO_PKG_VERSION"));

/// Where the usage table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Dataset page listing the archives; the UTF-8 archive link is scraped from it.
    DatasetPage(String),
    ArchiveUrl(String),
    Archive(PathBuf),
    Csv(PathBuf),
}

impl Source {
    /// Direct archive URL when configured, the dataset page otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.archive_url {
            Some(url) => Self::ArchiveUrl(url.clone()),
            None => Self::DatasetPage(settings.dataset_page_url.clone()),
        }
    }
}

/// The raw usage table, ready for the loader.
#[derive(Debug)]
pub struct Fetched {
    pub name: String,
    pub bytes: Vec<u8>,
    /// sha256 of the archive, when the table came out of one.
    pub archive_checksum: Option<String>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

fn client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(300))
        .build()?)
}

fn get(client: &Client, url: &str) -> Result<Vec<u8>> {
    debug!(url, "GET");
    let resp = client.get(url).send()?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AmmError::Fetch(format!("{url} answered {status}")));
    }
    Ok(resp.bytes()?.to_vec())
}

/// First anchor whose href points at the UTF-8 archive, resolved against `base`.
pub fn find_archive_link(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").ok()?;
    let href = document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains(ARCHIVE_MARKER))?;
    match Url::parse(base) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => Url::parse(href).ok().map(String::from),
    }
}

pub fn discover_archive_url(client: &Client, page_url: &str) -> Result<String> {
    let page = get(client, page_url)?;
    let html = String::from_utf8_lossy(&page);
    find_archive_link(&html, page_url).ok_or_else(|| {
        AmmError::Fetch(format!("no link containing '{ARCHIVE_MARKER}' on {page_url}"))
    })
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Pull the usage table out of a zip archive. The entry is looked up by exact
/// basename first, then by `prefix` among the `.csv` entries.
pub fn extract_entry(archive: &[u8], entry: &str, prefix: &str) -> Result<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let names: Vec<String> = zip.file_names().map(String::from).collect();

    let chosen = names
        .iter()
        .find(|n| basename(n) == entry)
        .or_else(|| {
            names.iter().find(|n| {
                let base = basename(n);
                base.starts_with(prefix) && base.to_lowercase().ends_with(".csv")
            })
        })
        .cloned()
        .ok_or_else(|| {
            AmmError::Fetch(format!(
                "archive has no '{entry}' entry (entries: {})",
                names.join(", ")
            ))
        })?;

    let mut file = zip.by_name(&chosen)?;
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok((chosen, bytes))
}

fn from_archive(archive: Vec<u8>, settings: &Settings) -> Result<Fetched> {
    let checksum = sha256_hex(&archive);
    info!(bytes = archive.len(), sha256 = %checksum, "archive ready");
    let (name, bytes) = extract_entry(&archive, &settings.archive_entry, &settings.archive_entry_prefix)?;
    info!(entry = %name, bytes = bytes.len(), "extracted usage table");
    Ok(Fetched {
        name,
        bytes,
        archive_checksum: Some(checksum),
    })
}

fn read_local(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| AmmError::Fetch(format!("cannot read {}: {e}", path.display())))
}

/// Obtain the raw usage table from `source`.
pub fn fetch(source: &Source, settings: &Settings) -> Result<Fetched> {
    match source {
        Source::DatasetPage(page) => {
            let client = client()?;
            let url = discover_archive_url(&client, page)?;
            info!(%url, "found archive link");
            from_archive(get(&client, &url)?, settings)
        }
        Source::ArchiveUrl(url) => {
            let client = client()?;
            info!(%url, "downloading archive");
            from_archive(get(&client, url)?, settings)
        }
        Source::Archive(path) => {
            info!(path = %path.display(), "reading local archive");
            from_archive(read_local(path)?, settings)
        }
        Source::Csv(path) => {
            info!(path = %path.display(), "reading local table");
            Ok(Fetched {
                name: path.display().to_string(),
                bytes: read_local(path)?,
                archive_checksum: None,
            })
        }
    }
}
