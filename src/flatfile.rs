// ⚙️ Flatfile stage - runs the whole transformation end to end
// Reads the six split tables, generates and merges all variant streams,
// and writes the chunked output for the downstream matcher

use crate::base::build_base_addresses;
use crate::chunks;
use crate::classify::best_classifications;
use crate::combine::combine_and_dedupe;
use crate::records::{Blpu, Classification, DeliveryPoint, Lpi, Organisation, StreetDescriptor};
use crate::settings::Settings;
use crate::streets::ResolvedStreets;
use crate::tables;
use crate::variants::delivery::{best_delivery_references, render_delivery_variants};
use crate::variants::level::render_level_variants;
use crate::variants::lpi::render_lpi_variants;
use crate::variants::organisation::render_organisation_variants;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone)]
pub struct FlatfileStats {
    pub input_uprns: usize,
    pub output_uprns: usize,
    pub total_variants: usize,
    pub uplift_pct: f64,
}

#[derive(Debug, Clone)]
pub struct FlatfileReport {
    /// Chunk files this run produced (or found already present).
    pub outputs: Vec<PathBuf>,
    pub skipped: bool,
    pub stats: Option<FlatfileStats>,
}

// ============================================================================
// STAGE RUNNER
// ============================================================================

pub fn transform_to_flatfile(settings: &Settings, force: bool) -> Result<FlatfileReport> {
    let total_timer = Instant::now();
    let tables_dir = settings.tables_dir();
    tables::assert_inputs_exist(&tables_dir)?;

    let output_dir = settings.output_dir();
    let num_chunks = settings.processing.num_chunks;
    let expected_files = chunks::expected_chunk_files(&output_dir, num_chunks)?;

    if !force && expected_files.iter().all(|path| path.exists()) {
        info!(
            "Output already exists: {}. Use --force to re-process.",
            output_dir.display()
        );
        return Ok(FlatfileReport {
            outputs: expected_files,
            skipped: true,
            stats: None,
        });
    }

    let blpus: Vec<Blpu> = tables::read_table(&tables_dir.join(tables::BLPU_TABLE))?;
    let lpis: Vec<Lpi> = tables::read_table(&tables_dir.join(tables::LPI_TABLE))?;
    let street_descriptors: Vec<StreetDescriptor> =
        tables::read_table(&tables_dir.join(tables::STREET_DESCRIPTOR_TABLE))?;
    let organisations: Vec<Organisation> =
        tables::read_table(&tables_dir.join(tables::ORGANISATION_TABLE))?;
    let delivery_points: Vec<DeliveryPoint> =
        tables::read_table(&tables_dir.join(tables::DELIVERY_POINT_TABLE))?;
    let classification_rows: Vec<Classification> =
        tables::read_table(&tables_dir.join(tables::CLASSIFICATION_TABLE))?;
    info!(
        "Loaded {} BLPU, {} LPI, {} street, {} organisation, {} delivery point, {} classification rows",
        blpus.len(),
        lpis.len(),
        street_descriptors.len(),
        organisations.len(),
        delivery_points.len(),
        classification_rows.len()
    );

    let step_timer = Instant::now();
    let streets = ResolvedStreets::resolve(&street_descriptors);
    let base = build_base_addresses(&blpus, &lpis, &streets);
    let classifications = best_classifications(&classification_rows);
    let delivery_references = best_delivery_references(&delivery_points);
    let expected_uprns: HashSet<u64> = base.distinct.iter().map(|address| address.uprn).collect();
    info!(
        "Preparation completed in {:.2} seconds",
        step_timer.elapsed().as_secs_f64()
    );

    let mut variants = Vec::new();

    let step_timer = Instant::now();
    let generated = render_lpi_variants(&base);
    info!(
        "LPI variants completed in {:.2} seconds ({} variants)",
        step_timer.elapsed().as_secs_f64(),
        generated.len()
    );
    variants.extend(generated);

    let step_timer = Instant::now();
    let generated = render_organisation_variants(&organisations, &base);
    info!(
        "Business variants completed in {:.2} seconds ({} variants)",
        step_timer.elapsed().as_secs_f64(),
        generated.len()
    );
    variants.extend(generated);

    let step_timer = Instant::now();
    let generated = render_delivery_variants(&delivery_points);
    info!(
        "Delivery point variants completed in {:.2} seconds ({} variants)",
        step_timer.elapsed().as_secs_f64(),
        generated.len()
    );
    variants.extend(generated);

    let step_timer = Instant::now();
    let generated = render_level_variants(&base);
    info!(
        "Custom level variants completed in {:.2} seconds ({} variants)",
        step_timer.elapsed().as_secs_f64(),
        generated.len()
    );
    variants.extend(generated);

    let rows = combine_and_dedupe(variants, &classifications, &delivery_references, &expected_uprns)?;

    let output_uprns: HashSet<u64> = rows.iter().map(|row| row.uprn).collect();
    let stats = FlatfileStats {
        input_uprns: expected_uprns.len(),
        output_uprns: output_uprns.len(),
        total_variants: rows.len(),
        uplift_pct: variant_uplift(rows.len(), output_uprns.len()),
    };
    info!(
        "Address Statistics - Input UPRNs (Unique): {} | Output UPRNs (Unique): {} | Total Address Variants Generated: {} | Variant Uplift: {:.1}%",
        stats.input_uprns, stats.output_uprns, stats.total_variants, stats.uplift_pct
    );

    remove_stale_chunks(&output_dir)?;
    let outputs = chunks::write_chunks(&output_dir, &rows, num_chunks)?;
    info!(
        "Wrote {} chunk file(s) under {}",
        outputs.len(),
        output_dir.display()
    );
    info!(
        "Flatfile transformation completed in {:.2} seconds",
        total_timer.elapsed().as_secs_f64()
    );

    Ok(FlatfileReport {
        outputs,
        skipped: false,
        stats: Some(stats),
    })
}

/// Extra variants per property as a percentage of the property count.
fn variant_uplift(total_variants: usize, output_uprns: usize) -> f64 {
    if output_uprns == 0 {
        return 0.0;
    }
    (total_variants - output_uprns) as f64 / output_uprns as f64 * 100.0
}

/// Drop leftover chunk files from earlier runs so a change of partition
/// count cannot leave a stale mix behind.
fn remove_stale_chunks(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    let prefix = format!("{}.chunk_", chunks::FLATFILE_STEM);
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("Failed to read directory: {}", output_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".csv") {
            fs::remove_file(entry.path())
                .with_context(|| format!("Failed to remove stale chunk: {}", name))?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::FlatfileRow;
    use crate::error::PipelineError;

    fn create_test_lpi(uprn: u64, usrn: u64, pao_number: i32, level: &str) -> Lpi {
        Lpi {
            uprn,
            lpi_key: format!("KEY-{}", uprn),
            language: "ENG".to_string(),
            logical_status: 1,
            start_date: None,
            end_date: None,
            last_update_date: None,
            sao_start_number: None,
            sao_start_suffix: String::new(),
            sao_end_number: None,
            sao_end_suffix: String::new(),
            sao_text: String::new(),
            pao_start_number: Some(pao_number),
            pao_start_suffix: String::new(),
            pao_end_number: None,
            pao_end_suffix: String::new(),
            pao_text: String::new(),
            usrn,
            level: level.to_string(),
            official_flag: "Y".to_string(),
        }
    }

    fn write_input_tables(tables_dir: &Path) {
        let blpus = vec![
            Blpu {
                uprn: 100,
                blpu_state: Some(2),
                parent_uprn: None,
                addressbase_postal: "D".to_string(),
                postcode_locator: "AB1 2CD".to_string(),
            },
            Blpu {
                uprn: 200,
                blpu_state: None,
                parent_uprn: None,
                addressbase_postal: "D".to_string(),
                postcode_locator: "AB1 2CE".to_string(),
            },
        ];
        let lpis = vec![
            create_test_lpi(100, 7001, 10, "2,PARTIAL"),
            create_test_lpi(200, 7001, 12, ""),
        ];
        let streets = vec![StreetDescriptor {
            usrn: 7001,
            street_description: "HIGH STREET".to_string(),
            locality: String::new(),
            town_name: "SPRINGFIELD".to_string(),
            language: "ENG".to_string(),
            start_date: None,
            end_date: None,
            last_update_date: None,
        }];
        let organisations = vec![Organisation {
            uprn: 100,
            organisation: "ACME LTD".to_string(),
            legal_name: String::new(),
            start_date: None,
            end_date: None,
        }];
        let delivery_points = vec![DeliveryPoint {
            uprn: 100,
            udprn: Some(5001),
            organisation_name: String::new(),
            department_name: String::new(),
            sub_building_name: String::new(),
            building_name: String::new(),
            building_number: "10".to_string(),
            dependent_thoroughfare: String::new(),
            thoroughfare: "HIGH STREET".to_string(),
            double_dependent_locality: String::new(),
            dependent_locality: String::new(),
            post_town: "SPRINGFIELD".to_string(),
            postcode: "AB1 2CD".to_string(),
            start_date: None,
            end_date: None,
            last_update_date: None,
        }];
        let classifications = vec![Classification {
            uprn: 100,
            classification_code: "RD04".to_string(),
            class_scheme: "AddressBase Premium Classification Scheme".to_string(),
            start_date: None,
            end_date: None,
            last_update_date: None,
        }];

        tables::write_table(&tables_dir.join(tables::BLPU_TABLE), &blpus).unwrap();
        tables::write_table(&tables_dir.join(tables::LPI_TABLE), &lpis).unwrap();
        tables::write_table(&tables_dir.join(tables::STREET_DESCRIPTOR_TABLE), &streets).unwrap();
        tables::write_table(&tables_dir.join(tables::ORGANISATION_TABLE), &organisations).unwrap();
        tables::write_table(
            &tables_dir.join(tables::DELIVERY_POINT_TABLE),
            &delivery_points,
        )
        .unwrap();
        tables::write_table(
            &tables_dir.join(tables::CLASSIFICATION_TABLE),
            &classifications,
        )
        .unwrap();
    }

    fn read_all_rows(paths: &[PathBuf]) -> Vec<FlatfileRow> {
        let mut rows = Vec::new();
        for path in paths {
            let chunk: Vec<FlatfileRow> = tables::read_table(path).unwrap();
            rows.extend(chunk);
        }
        rows
    }

    #[test]
    fn test_end_to_end_produces_expected_variants() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_work_dir(dir.path());
        write_input_tables(&settings.tables_dir());

        let report = transform_to_flatfile(&settings, false).unwrap();
        assert!(!report.skipped);

        let rows = read_all_rows(&report.outputs);
        // Property 100: primary LPI + business + floor level (the
        // delivery point text collapses into the LPI variant).
        // Property 200: just its LPI variant.
        assert_eq!(rows.len(), 4);

        let primary = rows
            .iter()
            .find(|row| row.uprn == 100 && row.is_primary)
            .unwrap();
        assert_eq!(primary.address_concat, "10 HIGH STREET SPRINGFIELD AB1 2CD");
        assert_eq!(primary.source, "LPI");
        assert_eq!(primary.variant_label, "APPROVED");
        assert_eq!(primary.classification_code.as_deref(), Some("RD04"));
        assert_eq!(primary.udprn, Some(5001));
        assert_eq!(primary.logical_status, Some(1));
        assert_eq!(primary.hierarchy_level.as_deref(), Some("S"));

        let labels: Vec<&str> = rows
            .iter()
            .filter(|row| row.uprn == 100)
            .map(|row| row.variant_label.as_str())
            .collect();
        assert!(labels.contains(&"BUSINESS_CURRENT"));
        assert!(labels.contains(&"CUSTOM_LEVEL"));

        let business = rows
            .iter()
            .find(|row| row.variant_label == "BUSINESS_CURRENT")
            .unwrap();
        assert_eq!(
            business.address_concat,
            "ACME LTD 10 HIGH STREET SPRINGFIELD AB1 2CD"
        );

        let level = rows
            .iter()
            .find(|row| row.variant_label == "CUSTOM_LEVEL")
            .unwrap();
        assert_eq!(
            level.address_concat,
            "SECOND 10 HIGH STREET SPRINGFIELD AB1 2CD"
        );

        let stats = report.stats.unwrap();
        assert_eq!(stats.input_uprns, 2);
        assert_eq!(stats.output_uprns, 2);
        assert_eq!(stats.total_variants, 4);
        assert!((stats.uplift_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_existing_output_is_skipped_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_work_dir(dir.path());
        write_input_tables(&settings.tables_dir());

        let first = transform_to_flatfile(&settings, false).unwrap();
        assert!(!first.skipped);
        let modified_before = fs::metadata(&first.outputs[0]).unwrap().modified().unwrap();

        let second = transform_to_flatfile(&settings, false).unwrap();
        assert!(second.skipped);
        assert!(second.stats.is_none());
        let modified_after = fs::metadata(&first.outputs[0]).unwrap().modified().unwrap();
        assert_eq!(modified_before, modified_after);

        let third = transform_to_flatfile(&settings, true).unwrap();
        assert!(!third.skipped);
        assert!(third.stats.is_some());
    }

    #[test]
    fn test_chunked_output_unions_to_the_single_file_run() {
        let dir = tempfile::tempdir().unwrap();
        let tables_dir = dir.path().join("tables");
        write_input_tables(&tables_dir);

        let mut single = Settings::with_work_dir(dir.path().join("single"));
        single.paths.tables_dir = Some(tables_dir.clone());
        let mut chunked = Settings::with_work_dir(dir.path().join("chunked"));
        chunked.paths.tables_dir = Some(tables_dir);
        chunked.processing.num_chunks = 2;

        let baseline = transform_to_flatfile(&single, false).unwrap();
        let split = transform_to_flatfile(&chunked, false).unwrap();
        assert_eq!(split.outputs.len(), 2);

        let baseline_rows = read_all_rows(&baseline.outputs);
        let chunk_rows = read_all_rows(&split.outputs);
        assert_eq!(baseline_rows.len(), chunk_rows.len());

        let baseline_uprns: HashSet<u64> = baseline_rows.iter().map(|r| r.uprn).collect();
        let chunk_uprns: HashSet<u64> = chunk_rows.iter().map(|r| r.uprn).collect();
        assert_eq!(baseline_uprns, chunk_uprns);

        // No UPRN may span two chunks
        let first: Vec<FlatfileRow> = tables::read_table(&split.outputs[0]).unwrap();
        let second: Vec<FlatfileRow> = tables::read_table(&split.outputs[1]).unwrap();
        let first_uprns: HashSet<u64> = first.iter().map(|r| r.uprn).collect();
        let second_uprns: HashSet<u64> = second.iter().map(|r| r.uprn).collect();
        assert!(first_uprns.is_disjoint(&second_uprns));
    }

    #[test]
    fn test_changing_chunk_count_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_work_dir(dir.path());
        settings.processing.num_chunks = 3;
        write_input_tables(&settings.tables_dir());

        transform_to_flatfile(&settings, false).unwrap();
        settings.processing.num_chunks = 1;
        let report = transform_to_flatfile(&settings, true).unwrap();

        let names: Vec<String> = fs::read_dir(settings.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(report.outputs.len(), 1);
    }

    #[test]
    fn test_missing_tables_fail_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_work_dir(dir.path());

        let err = transform_to_flatfile(&settings, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingInputs { .. })
        ));
        assert!(!settings.output_dir().exists());
    }
}
