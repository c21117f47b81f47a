// 🗄️ Table Store - Typed CSV interchange between pipeline stages
// All writes go to a temporary sibling first and are renamed into place

use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

// ============================================================================
// TABLE NAMES
// ============================================================================

pub const BLPU_TABLE: &str = "blpu.csv";
pub const LPI_TABLE: &str = "lpi.csv";
pub const STREET_DESCRIPTOR_TABLE: &str = "street_descriptor.csv";
pub const ORGANISATION_TABLE: &str = "organisation.csv";
pub const DELIVERY_POINT_TABLE: &str = "delivery_point.csv";
pub const CLASSIFICATION_TABLE: &str = "classification.csv";

/// Every table the flatfile stage requires as input.
pub const REQUIRED_TABLES: [&str; 6] = [
    BLPU_TABLE,
    LPI_TABLE,
    STREET_DESCRIPTOR_TABLE,
    ORGANISATION_TABLE,
    DELIVERY_POINT_TABLE,
    CLASSIFICATION_TABLE,
];

// ============================================================================
// PRECONDITIONS
// ============================================================================

/// Fail fast when any of the six split tables is missing.
pub fn assert_inputs_exist(tables_dir: &Path) -> Result<(), PipelineError> {
    let missing: Vec<String> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|name| !tables_dir.join(name).exists())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::missing_inputs(tables_dir, missing, "split"))
    }
}

// ============================================================================
// READ / WRITE
// ============================================================================

/// Read a whole table into typed rows.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line_num, result) in reader.deserialize().enumerate() {
        // +2 because: 1-indexed + header row
        let row: T = result.with_context(|| {
            format!("Failed to parse row {} in {}", line_num + 2, path.display())
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Write typed rows to a table, atomically.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp_path = temp_sibling(path);
    if let Err(err) = write_rows(&tmp_path, rows) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to publish table: {}", path.display()))?;

    Ok(())
}

/// Raw (non-atomic) CSV write; callers own the temp-then-rename dance.
pub(crate) fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to serialize row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    Ok(())
}

/// Temporary path next to the target so the final rename stays on one
/// filesystem.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Blpu;
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct DatedRow {
        uprn: u64,
        end_date: Option<NaiveDate>,
    }

    #[test]
    fn test_write_then_read_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blpu.csv");

        let rows = vec![
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
                parent_uprn: Some(100),
                addressbase_postal: "N".to_string(),
                postcode_locator: "AB1 2CE".to_string(),
            },
        ];

        write_table(&path, &rows).unwrap();
        let read: Vec<Blpu> = read_table(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn test_empty_date_maps_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dated.csv");

        let rows = vec![
            DatedRow {
                uprn: 1,
                end_date: Some(NaiveDate::from_ymd_opt(2020, 5, 17).unwrap()),
            },
            DatedRow {
                uprn: 2,
                end_date: None,
            },
        ];

        write_table(&path, &rows).unwrap();
        let read: Vec<DatedRow> = read_table(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blpu.csv");

        let rows = vec![Blpu {
            uprn: 1,
            blpu_state: None,
            parent_uprn: None,
            addressbase_postal: "D".to_string(),
            postcode_locator: "ZZ9 9ZZ".to_string(),
        }];
        write_table(&path, &rows).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["blpu.csv".to_string()]);
    }

    #[test]
    fn test_missing_inputs_lists_absent_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_table::<Blpu>(&dir.path().join(BLPU_TABLE), &[]).unwrap();

        let err = assert_inputs_exist(dir.path()).unwrap_err();
        match err {
            PipelineError::MissingInputs { missing, .. } => {
                assert_eq!(missing.len(), 5);
                assert!(!missing.contains(&BLPU_TABLE.to_string()));
                assert!(missing.contains(&LPI_TABLE.to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_assert_inputs_exist_passes_when_all_present() {
        let dir = tempfile::tempdir().unwrap();
        for name in REQUIRED_TABLES {
            std::fs::write(dir.path().join(name), "uprn\n").unwrap();
        }
        assert!(assert_inputs_exist(dir.path()).is_ok());
    }
}
