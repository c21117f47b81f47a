// ✂️ Split step - route raw ABP rows into per-type tables
// Raw exports interleave every record type in one CSV; the leading
// field carries the type code and decides each row's destination

use crate::error::PipelineError;
use crate::records::{Blpu, Classification, DeliveryPoint, Lpi, Organisation, StreetDescriptor};
use crate::settings::Settings;
use crate::tables;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// RECORD TYPE CODES
// ============================================================================

pub const BLPU_RECORD: &str = "21";
pub const LPI_RECORD: &str = "24";
pub const STREET_DESCRIPTOR_RECORD: &str = "15";
pub const ORGANISATION_RECORD: &str = "31";
pub const DELIVERY_POINT_RECORD: &str = "28";
pub const CLASSIFICATION_RECORD: &str = "32";

// ============================================================================
// FILE DISCOVERY
// ============================================================================

/// Every CSV under the extracted directory, any depth, sorted.
pub fn discover_raw_csv_files(extracted_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if extracted_dir.exists() {
        collect_csv_files(extracted_dir, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_csv_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_csv_files(&path, files)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn field<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("")
}

fn require_u64(record: &StringRecord, index: usize, name: &str) -> Result<u64> {
    let raw = field(record, index);
    raw.parse()
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn require_u8(record: &StringRecord, index: usize, name: &str) -> Result<u8> {
    let raw = field(record, index);
    raw.parse()
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn optional_u64(record: &StringRecord, index: usize, name: &str) -> Result<Option<u64>> {
    let raw = field(record, index);
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn optional_u8(record: &StringRecord, index: usize, name: &str) -> Result<Option<u8>> {
    let raw = field(record, index);
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn optional_i32(record: &StringRecord, index: usize, name: &str) -> Result<Option<i32>> {
    let raw = field(record, index);
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn optional_date(record: &StringRecord, index: usize, name: &str) -> Result<Option<NaiveDate>> {
    let raw = field(record, index);
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .with_context(|| format!("Invalid {}: {:?}", name, raw))
}

fn owned(record: &StringRecord, index: usize) -> String {
    field(record, index).to_string()
}

// ============================================================================
// ROW PARSERS
// ============================================================================

fn parse_blpu(record: &StringRecord) -> Result<Blpu> {
    Ok(Blpu {
        uprn: require_u64(record, 3, "uprn")?,
        blpu_state: optional_u8(record, 5, "blpu_state")?,
        parent_uprn: optional_u64(record, 7, "parent_uprn")?,
        addressbase_postal: owned(record, 19),
        postcode_locator: owned(record, 20),
    })
}

fn parse_lpi(record: &StringRecord) -> Result<Lpi> {
    Ok(Lpi {
        uprn: require_u64(record, 3, "uprn")?,
        lpi_key: owned(record, 4),
        language: owned(record, 5),
        logical_status: require_u8(record, 6, "logical_status")?,
        start_date: optional_date(record, 7, "start_date")?,
        end_date: optional_date(record, 8, "end_date")?,
        last_update_date: optional_date(record, 9, "last_update_date")?,
        sao_start_number: optional_i32(record, 11, "sao_start_number")?,
        sao_start_suffix: owned(record, 12),
        sao_end_number: optional_i32(record, 13, "sao_end_number")?,
        sao_end_suffix: owned(record, 14),
        sao_text: owned(record, 15),
        pao_start_number: optional_i32(record, 16, "pao_start_number")?,
        pao_start_suffix: owned(record, 17),
        pao_end_number: optional_i32(record, 18, "pao_end_number")?,
        pao_end_suffix: owned(record, 19),
        pao_text: owned(record, 20),
        usrn: require_u64(record, 21, "usrn")?,
        level: owned(record, 24),
        official_flag: owned(record, 25),
    })
}

fn parse_street_descriptor(record: &StringRecord) -> Result<StreetDescriptor> {
    Ok(StreetDescriptor {
        usrn: require_u64(record, 3, "usrn")?,
        street_description: owned(record, 4),
        locality: owned(record, 5),
        town_name: owned(record, 6),
        language: owned(record, 8),
        start_date: optional_date(record, 9, "start_date")?,
        end_date: optional_date(record, 10, "end_date")?,
        last_update_date: optional_date(record, 11, "last_update_date")?,
    })
}

fn parse_organisation(record: &StringRecord) -> Result<Organisation> {
    Ok(Organisation {
        uprn: require_u64(record, 3, "uprn")?,
        organisation: owned(record, 5),
        legal_name: owned(record, 6),
        start_date: optional_date(record, 7, "start_date")?,
        end_date: optional_date(record, 8, "end_date")?,
    })
}

fn parse_delivery_point(record: &StringRecord) -> Result<DeliveryPoint> {
    Ok(DeliveryPoint {
        uprn: require_u64(record, 3, "uprn")?,
        udprn: optional_u64(record, 4, "udprn")?,
        organisation_name: owned(record, 5),
        department_name: owned(record, 6),
        sub_building_name: owned(record, 7),
        building_name: owned(record, 8),
        building_number: owned(record, 9),
        dependent_thoroughfare: owned(record, 10),
        thoroughfare: owned(record, 11),
        double_dependent_locality: owned(record, 12),
        dependent_locality: owned(record, 13),
        post_town: owned(record, 14),
        postcode: owned(record, 15),
        start_date: optional_date(record, 26, "start_date")?,
        end_date: optional_date(record, 27, "end_date")?,
        last_update_date: optional_date(record, 28, "last_update_date")?,
    })
}

fn parse_classification(record: &StringRecord) -> Result<Classification> {
    Ok(Classification {
        uprn: require_u64(record, 3, "uprn")?,
        classification_code: owned(record, 5),
        class_scheme: owned(record, 6),
        start_date: optional_date(record, 8, "start_date")?,
        end_date: optional_date(record, 9, "end_date")?,
        last_update_date: optional_date(record, 10, "last_update_date")?,
    })
}

// ============================================================================
// STEP ENTRY POINT
// ============================================================================

pub fn run_split_step(settings: &Settings, force: bool) -> Result<BTreeMap<String, PathBuf>> {
    let extracted_dir = settings.extracted_dir();
    let tables_dir = settings.tables_dir();

    let outputs: BTreeMap<String, PathBuf> = tables::REQUIRED_TABLES
        .iter()
        .map(|name| (name.to_string(), tables_dir.join(name)))
        .collect();

    if !force && outputs.values().all(|path| path.exists()) {
        info!(
            "Tables already exist: {}. Use --force to re-process.",
            tables_dir.display()
        );
        return Ok(outputs);
    }

    let raw_files = discover_raw_csv_files(&extracted_dir)?;
    if raw_files.is_empty() {
        return Err(PipelineError::missing_inputs(
            &extracted_dir,
            vec!["*.csv".to_string()],
            "extract",
        )
        .into());
    }

    let mut blpus: Vec<Blpu> = Vec::new();
    let mut lpis: Vec<Lpi> = Vec::new();
    let mut streets: Vec<StreetDescriptor> = Vec::new();
    let mut organisations: Vec<Organisation> = Vec::new();
    let mut delivery_points: Vec<DeliveryPoint> = Vec::new();
    let mut classifications: Vec<Classification> = Vec::new();
    let mut skipped_delivery = 0usize;

    for path in &raw_files {
        info!("Splitting {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        for (row_num, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to read row {} in {}", row_num + 1, path.display())
            })?;
            let row_context =
                || format!("Failed to parse row {} in {}", row_num + 1, path.display());

            match field(&record, 0) {
                BLPU_RECORD => blpus.push(parse_blpu(&record).with_context(row_context)?),
                LPI_RECORD => lpis.push(parse_lpi(&record).with_context(row_context)?),
                STREET_DESCRIPTOR_RECORD => {
                    streets.push(parse_street_descriptor(&record).with_context(row_context)?)
                }
                ORGANISATION_RECORD => {
                    organisations.push(parse_organisation(&record).with_context(row_context)?)
                }
                DELIVERY_POINT_RECORD => {
                    // A delivery point without a UPRN cannot join anything
                    if field(&record, 3).is_empty() {
                        skipped_delivery += 1;
                    } else {
                        delivery_points
                            .push(parse_delivery_point(&record).with_context(row_context)?);
                    }
                }
                CLASSIFICATION_RECORD => {
                    classifications.push(parse_classification(&record).with_context(row_context)?)
                }
                _ => {}
            }
        }
    }

    if skipped_delivery > 0 {
        warn!(
            "Skipped {} delivery point row(s) with no UPRN",
            skipped_delivery
        );
    }

    tables::write_table(&tables_dir.join(tables::BLPU_TABLE), &blpus)?;
    tables::write_table(&tables_dir.join(tables::LPI_TABLE), &lpis)?;
    tables::write_table(&tables_dir.join(tables::STREET_DESCRIPTOR_TABLE), &streets)?;
    tables::write_table(&tables_dir.join(tables::ORGANISATION_TABLE), &organisations)?;
    tables::write_table(
        &tables_dir.join(tables::DELIVERY_POINT_TABLE),
        &delivery_points,
    )?;
    tables::write_table(
        &tables_dir.join(tables::CLASSIFICATION_TABLE),
        &classifications,
    )?;

    info!(
        "Split {} BLPU, {} LPI, {} street, {} organisation, {} delivery point, {} classification rows",
        blpus.len(),
        lpis.len(),
        streets.len(),
        organisations.len(),
        delivery_points.len(),
        classifications.len()
    );

    Ok(outputs)
}

// ============================================================================
// TESTS
// ============================================================================
