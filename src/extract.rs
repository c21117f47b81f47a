// 🗜️ Extract step - unpack downloaded archives
// Each archive unpacks into a directory named after its stem, so the
// split step can scan extracted/ without knowing archive names

use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

fn archive_stem(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(ARCHIVE_SUFFIX)
}

/// All archives in the downloads directory, sorted for stable order.
pub fn find_archives(downloads_dir: &Path) -> Result<Vec<PathBuf>> {
    if !downloads_dir.exists() {
        return Ok(Vec::new());
    }
    let mut archives = Vec::new();
    for entry in fs::read_dir(downloads_dir)
        .with_context(|| format!("Failed to read directory: {}", downloads_dir.display()))?
    {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(ARCHIVE_SUFFIX) {
            archives.push(entry.path());
        }
    }
    archives.sort();
    Ok(archives)
}

/// Unpack one archive, skipping work already done unless forced.
pub fn extract_archive(archive: &Path, extracted_dir: &Path, force: bool) -> Result<PathBuf> {
    if !archive.exists() {
        bail!("Archive not found: {}", archive.display());
    }
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(stem) = archive_stem(&name) else {
        bail!("Not a {} archive: {}", ARCHIVE_SUFFIX, archive.display());
    };

    let dest = extracted_dir.join(stem);
    if dest.exists() {
        if !force {
            info!("Already extracted: {}", dest.display());
            return Ok(dest);
        }
        info!("Removing existing extraction: {}", dest.display());
        fs::remove_dir_all(&dest)
            .with_context(|| format!("Failed to remove {}", dest.display()))?;
    }

    info!("Extracting {} to {}", archive.display(), dest.display());
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let decoder = GzDecoder::new(file);
    tar::Archive::new(decoder)
        .unpack(&dest)
        .with_context(|| format!("Failed to unpack {}", archive.display()))?;

    Ok(dest)
}

// ============================================================================
// STEP ENTRY POINT
// ============================================================================

pub fn run_extract_step(settings: &Settings, force: bool) -> Result<Vec<PathBuf>> {
    let downloads_dir = settings.downloads_dir();
    let extracted_dir = settings.extracted_dir();
    fs::create_dir_all(&extracted_dir)
        .with_context(|| format!("Failed to create directory: {}", extracted_dir.display()))?;

    let archives = find_archives(&downloads_dir)?;
    if archives.is_empty() {
        warn!(
            "No archives found in {}. Run the fetch step first.",
            downloads_dir.display()
        );
        return Ok(Vec::new());
    }

    let mut extracted = Vec::new();
    for archive in &archives {
        extracted.push(extract_archive(archive, &extracted_dir, force)?);
    }
    info!("Extracted {} archive(s)", extracted.len());
    Ok(extracted)
}

// ============================================================================
// TESTS
// ============================================================================
