// 🔍 Inspect step - summarize and sample the generated flatfile
// Answers "did that run look right" without loading the output into a
// downstream tool

use crate::chunks;
use crate::combine::FlatfileRow;
use crate::error::PipelineError;
use crate::settings::Settings;
use crate::tables;
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// LOADING
// ============================================================================

pub fn find_chunk_files(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}.chunk_", chunks::FLATFILE_STEM);
    let mut files = Vec::new();
    if output_dir.exists() {
        for entry in fs::read_dir(output_dir)
            .with_context(|| format!("Failed to read directory: {}", output_dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".csv") {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_flatfile(output_dir: &Path) -> Result<Vec<FlatfileRow>> {
    let files = find_chunk_files(output_dir)?;
    if files.is_empty() {
        return Err(PipelineError::missing_inputs(
            output_dir,
            vec![format!("{}.chunk_*.csv", chunks::FLATFILE_STEM)],
            "flatfile",
        )
        .into());
    }

    let mut rows = Vec::new();
    for file in &files {
        let chunk: Vec<FlatfileRow> = tables::read_table(file)?;
        rows.extend(chunk);
    }
    Ok(rows)
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct VariantStatistics {
    pub total_uprns: usize,
    pub total_variants: usize,
    pub mean_variants: f64,
    pub median_variants: f64,
    pub min_variants: usize,
    pub max_variants: usize,
    /// Variant counts per source tag, sorted by tag.
    pub source_counts: Vec<(String, usize)>,
}

pub fn variant_statistics(rows: &[FlatfileRow]) -> Option<VariantStatistics> {
    if rows.is_empty() {
        return None;
    }

    let mut per_uprn: HashMap<u64, usize> = HashMap::new();
    let mut per_source: HashMap<String, usize> = HashMap::new();
    for row in rows {
        *per_uprn.entry(row.uprn).or_insert(0) += 1;
        *per_source.entry(row.source.clone()).or_insert(0) += 1;
    }
    let mut counts: Vec<usize> = per_uprn.values().copied().collect();
    counts.sort_unstable();
    let mut source_counts: Vec<(String, usize)> = per_source.into_iter().collect();
    source_counts.sort();

    let median_variants = if counts.len() % 2 == 1 {
        counts[counts.len() / 2] as f64
    } else {
        let upper = counts.len() / 2;
        (counts[upper - 1] + counts[upper]) as f64 / 2.0
    };

    Some(VariantStatistics {
        total_uprns: counts.len(),
        total_variants: rows.len(),
        mean_variants: rows.len() as f64 / counts.len() as f64,
        median_variants,
        min_variants: counts[0],
        max_variants: *counts.last()?,
        source_counts,
    })
}

// ============================================================================
// SAMPLING
// ============================================================================

pub fn random_uprn(rows: &[FlatfileRow]) -> Option<u64> {
    let mut uprns: Vec<u64> = rows.iter().map(|row| row.uprn).collect();
    uprns.sort_unstable();
    uprns.dedup();
    uprns.choose(&mut rand::thread_rng()).copied()
}

/// Random pick among the properties with the most variants. Big
/// multi-occupancy buildings make the most interesting spot checks.
pub fn random_large_uprn(rows: &[FlatfileRow], top_n: usize) -> Option<u64> {
    let mut per_uprn: HashMap<u64, usize> = HashMap::new();
    for row in rows {
        *per_uprn.entry(row.uprn).or_insert(0) += 1;
    }

    let mut ranked: Vec<(u64, usize)> = per_uprn.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_n);

    ranked
        .choose(&mut rand::thread_rng())
        .map(|(uprn, _)| *uprn)
}

pub fn uprn_variants(rows: &[FlatfileRow], uprn: u64) -> Vec<&FlatfileRow> {
    let mut matches: Vec<&FlatfileRow> = rows.iter().filter(|row| row.uprn == uprn).collect();
    matches.sort_by(|a, b| {
        (!a.is_primary, &a.source, &a.variant_label).cmp(&(
            !b.is_primary,
            &b.source,
            &b.variant_label,
        ))
    });
    matches
}

// ============================================================================
// STEP ENTRY POINT
// ============================================================================

pub fn run_inspect_step(settings: &Settings, uprn: Option<u64>) -> Result<()> {
    let rows = load_flatfile(&settings.output_dir())?;
    let banner = "=".repeat(60);

    if let Some(stats) = variant_statistics(&rows) {
        println!("{}", banner);
        println!("Flatfile statistics");
        println!("{}", banner);
        println!("Total UPRNs:        {}", stats.total_uprns);
        println!("Total variants:     {}", stats.total_variants);
        println!("Mean per UPRN:      {:.2}", stats.mean_variants);
        println!("Median per UPRN:    {:.1}", stats.median_variants);
        println!(
            "Min / max per UPRN: {} / {}",
            stats.min_variants, stats.max_variants
        );
        println!("Variants by source:");
        for (source, count) in &stats.source_counts {
            println!("  {:<16} {}", source, count);
        }
    }

    match uprn {
        Some(requested) => print_uprn_sample(&rows, requested, "Requested property"),
        None => {
            if let Some(sampled) = random_uprn(&rows) {
                print_uprn_sample(&rows, sampled, "Random property");
            }
            if let Some(sampled) = random_large_uprn(&rows, 100) {
                print_uprn_sample(&rows, sampled, "Random large property");
            }
        }
    }

    Ok(())
}

fn print_uprn_sample(rows: &[FlatfileRow], uprn: u64, heading: &str) {
    let banner = "=".repeat(60);
    let variants = uprn_variants(rows, uprn);

    println!("{}", banner);
    if variants.is_empty() {
        println!("{}: no rows for UPRN {}", heading, uprn);
        return;
    }
    println!("{}: UPRN {} ({} variants)", heading, uprn, variants.len());
    println!("{}", banner);
    for row in variants {
        println!(
            "  [{}{}] {} :: {}",
            row.source,
            if row.is_primary { ", primary" } else { "" },
            row.variant_label,
            row.address_concat
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
