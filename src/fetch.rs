// 🌐 Fetch step - download the data package from the OS Downloads API
// Files are streamed to .part siblings, checksum-verified, and renamed
// into place; existing verified files are never fetched twice

use crate::error::PipelineError;
use crate::settings::{Settings, API_KEY_ENV};
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const API_BASE_URL: &str = "https://api.os.uk/downloads/v1";

const DOWNLOAD_CHUNK_BYTES: usize = 8192;

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_on: String,
    #[serde(default)]
    pub supply_type: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub downloads: Vec<DownloadItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadItem {
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
    /// Hex digest published alongside the file; absent for some packages
    #[serde(default)]
    pub sha256: Option<String>,
}

// ============================================================================
// METADATA
// ============================================================================

pub fn get_package_version(settings: &Settings) -> Result<PackageVersion> {
    let downloads = &settings.downloads;
    let url = format!(
        "{}/dataPackages/{}/versions/{}",
        API_BASE_URL, downloads.package_id, downloads.version_id
    );
    info!("Fetching package metadata: {}", url);

    let client = metadata_client()?;
    let response = client
        .get(&url)
        .header("key", &downloads.api_key)
        .send()
        .with_context(|| format!("Failed to request {}", url))?
        .error_for_status()
        .context("OS Downloads API rejected the request")?;

    let version: PackageVersion = response.json().context("Failed to decode package metadata")?;
    Ok(version)
}

fn metadata_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Data files run to tens of gigabytes, so only the connect phase gets a
/// deadline.
fn download_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(None)
        .build()
        .context("Failed to build HTTP client")
}

// ============================================================================
// DOWNLOADING
// ============================================================================

/// Fetch one file unless a verified copy already exists. Returns true
/// when the file was actually downloaded.
pub fn download_file(
    client: &Client,
    item: &DownloadItem,
    dest_dir: &Path,
    api_key: &str,
    force: bool,
) -> Result<bool> {
    let target = dest_dir.join(&item.file_name);
    if target.exists() && !force {
        match &item.sha256 {
            Some(expected) => {
                let actual = file_sha256(&target)?;
                if actual.eq_ignore_ascii_case(expected) {
                    info!("Already downloaded: {}", item.file_name);
                    return Ok(false);
                }
                warn!(
                    "Checksum mismatch on existing {}; downloading again",
                    item.file_name
                );
            }
            None => {
                info!("Already downloaded: {}", item.file_name);
                return Ok(false);
            }
        }
    }

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let url = with_key_param(&item.url, api_key)?;
    info!("Downloading {} ({})", item.file_name, format_size(item.size));

    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to request {}", item.file_name))?
        .error_for_status()
        .with_context(|| format!("Download rejected for {}", item.file_name))?;

    let part_path = part_sibling(&target);
    let mut file = File::create(&part_path)
        .with_context(|| format!("Failed to create file: {}", part_path.display()))?;

    // Hash while streaming so the file is never read twice
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; DOWNLOAD_CHUNK_BYTES];
    loop {
        let read = response
            .read(&mut buffer)
            .with_context(|| format!("Failed while downloading {}", item.file_name))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        file.write_all(&buffer[..read])
            .with_context(|| format!("Failed to write {}", part_path.display()))?;
    }
    file.flush()
        .with_context(|| format!("Failed to flush {}", part_path.display()))?;
    drop(file);

    if let Some(expected) = &item.sha256 {
        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            let _ = fs::remove_file(&part_path);
            return Err(PipelineError::ChecksumMismatch {
                file: item.file_name.clone(),
                expected: expected.clone(),
                actual,
            }
            .into());
        }
    }

    fs::rename(&part_path, &target)
        .with_context(|| format!("Failed to publish download: {}", target.display()))?;

    let written = fs::metadata(&target)
        .with_context(|| format!("Failed to stat {}", target.display()))?
        .len();
    if item.size > 0 && written != item.size {
        warn!(
            "Size mismatch for {}: expected {}, got {}",
            item.file_name, item.size, written
        );
    }

    Ok(true)
}

pub fn download_all(
    settings: &Settings,
    version: &PackageVersion,
    force: bool,
) -> Result<Vec<PathBuf>> {
    let dest_dir = settings.downloads_dir();
    let client = download_client()?;

    let mut paths = Vec::new();
    let mut fetched = 0usize;
    let mut skipped = 0usize;
    for item in &version.downloads {
        let fresh = download_file(&client, item, &dest_dir, &settings.downloads.api_key, force)
            .with_context(|| format!("Failed to download {}", item.file_name))?;
        if fresh {
            fetched += 1;
        } else {
            skipped += 1;
        }
        paths.push(dest_dir.join(&item.file_name));
    }
    info!(
        "Downloads complete: {} fetched, {} already present",
        fetched, skipped
    );
    Ok(paths)
}

/// Swap any existing key parameter for ours; the API sometimes embeds a
/// placeholder key in the download URLs it hands back.
fn with_key_param(raw: &str, api_key: &str) -> Result<String> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid download URL: {}", raw))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("key"))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        pairs.append_pair("key", api_key);
    }
    Ok(url.into())
}

fn part_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn file_sha256(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; DOWNLOAD_CHUNK_BYTES];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// SUMMARY
// ============================================================================

pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

/// Human-readable file listing for `--list`, with ready-to-use download
/// URLs (key already appended).
pub fn print_download_summary(version: &PackageVersion, api_key: &str) {
    let banner = "=".repeat(80);
    println!("{}", banner);
    println!(
        "Package version {} (created {})",
        or_na(&version.id),
        or_na(&version.created_on)
    );
    println!(
        "Supply: {} | Format: {}",
        or_na(&version.supply_type),
        or_na(&version.format)
    );
    println!("{}", banner);

    if version.downloads.is_empty() {
        println!("No downloadable files found.");
        return;
    }

    let mut total = 0u64;
    for (index, item) in version.downloads.iter().enumerate() {
        total += item.size;
        let url = if item.url.is_empty() {
            "n/a".to_string()
        } else {
            with_key_param(&item.url, api_key).unwrap_or_else(|_| item.url.clone())
        };
        println!("{:3}. {}", index + 1, item.file_name);
        println!("     Size:   {} ({} bytes)", format_size(item.size), item.size);
        println!("     SHA256: {}", item.sha256.as_deref().unwrap_or("n/a"));
        println!("     URL:    {}", url);
    }
    println!("{}", banner);
    println!(
        "{} file(s), {} total",
        version.downloads.len(),
        format_size(total)
    );
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "n/a"
    } else {
        value
    }
}

// ============================================================================
// STEP ENTRY POINT
// ============================================================================

pub fn run_fetch_step(settings: &Settings, force: bool, list_only: bool) -> Result<()> {
    if settings.downloads.api_key.is_empty() {
        bail!(
            "No API key configured. Set {} or downloads.api_key in the config file",
            API_KEY_ENV
        );
    }
    if settings.downloads.package_id.is_empty() || settings.downloads.version_id.is_empty() {
        bail!("downloads.package_id and downloads.version_id must be configured");
    }

    let version = get_package_version(settings)?;
    print_download_summary(&version, &settings.downloads.api_key);
    if list_only {
        return Ok(());
    }

    download_all(settings, &version, force)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
