// 🚦 Pipeline - step orchestration and force cleanup
// Each step is restartable on its own; `all` chains them in dependency
// order. Force cleans only the step's own output patterns, never whole
// directories it does not recognise

use crate::settings::Settings;
use crate::{extract, fetch, flatfile, split};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

// ============================================================================
// STEPS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Extract,
    Split,
    Flatfile,
    All,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::Extract => "extract",
            Step::Split => "split",
            Step::Flatfile => "flatfile",
            Step::All => "all",
        }
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Run one step, or all of them in order. `list_only` applies to the
/// fetch step and turns it into a download listing.
pub fn run(step: Step, settings: &Settings, force: bool, list_only: bool) -> Result<()> {
    if step == Step::All {
        for stage in [Step::Fetch, Step::Extract, Step::Split, Step::Flatfile] {
            run(stage, settings, force, false)?;
        }
        info!("All steps completed");
        return Ok(());
    }

    let banner = "=".repeat(60);
    info!("{}", banner);
    info!("Running {} step", step.name());
    info!("{}", banner);

    if force {
        clean_step_outputs(step, settings)?;
    }

    let timer = Instant::now();
    match step {
        Step::Fetch => fetch::run_fetch_step(settings, force, list_only)?,
        Step::Extract => {
            extract::run_extract_step(settings, force)?;
        }
        Step::Split => {
            split::run_split_step(settings, force)?;
        }
        Step::Flatfile => {
            flatfile::transform_to_flatfile(settings, force)?;
        }
        // Expanded above
        Step::All => {}
    }
    info!(
        "{} step completed in {:.2} seconds",
        step.name(),
        timer.elapsed().as_secs_f64()
    );

    Ok(())
}

// ============================================================================
// FORCE CLEANUP
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum CleanPattern {
    /// CSV files directly inside the directory.
    TopLevelCsv,
    /// CSV files one directory level down, as extraction lays them out.
    NestedCsv,
}

fn clean_step_outputs(step: Step, settings: &Settings) -> Result<()> {
    match step {
        Step::Extract => clean_matching(
            &settings.extracted_dir(),
            &settings.paths.work_dir,
            CleanPattern::NestedCsv,
        ),
        Step::Split => clean_matching(
            &settings.tables_dir(),
            &settings.paths.work_dir,
            CleanPattern::TopLevelCsv,
        ),
        Step::Flatfile => clean_matching(
            &settings.output_dir(),
            &settings.paths.work_dir,
            CleanPattern::TopLevelCsv,
        ),
        // Downloads are kept; fetch re-verifies them itself
        Step::Fetch | Step::All => Ok(()),
    }
}

fn clean_matching(dir: &Path, work_dir: &Path, pattern: CleanPattern) -> Result<()> {
    if !dir.starts_with(work_dir) {
        warn!(
            "Refusing to clean {} - not under work_dir {}",
            dir.display(),
            work_dir.display()
        );
        return Ok(());
    }
    if !dir.exists() {
        return Ok(());
    }

    match pattern {
        CleanPattern::TopLevelCsv => remove_csv_files(dir),
        CleanPattern::NestedCsv => {
            for entry in fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            {
                let path = entry?.path();
                if path.is_dir() {
                    remove_csv_files(&path)?;
                }
            }
            Ok(())
        }
    }
}

fn remove_csv_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
