// 📦 Chunked output - hash-partitioned flatfile writer
// Chunks are disjoint by UPRN, so any subset can be processed
// independently and the union always equals the single-file output

use crate::combine::FlatfileRow;
use crate::error::PipelineError;
use crate::tables;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const FLATFILE_STEM: &str = "abp_for_uk_address_matcher";

// ============================================================================
// PARTITION PARAMETERS
// ============================================================================

pub fn validate_chunk_params(num_chunks: i64, chunk_id: i64) -> Result<(), PipelineError> {
    if num_chunks < 1 {
        return Err(PipelineError::InvalidChunkCount(num_chunks));
    }
    if chunk_id < 0 || chunk_id >= num_chunks {
        return Err(PipelineError::InvalidChunkId {
            num_chunks,
            chunk_id,
        });
    }
    Ok(())
}

/// Stable partition hash. SHA-256 keeps assignments identical across
/// runs, platforms and compiler versions, which the default hasher does
/// not guarantee.
pub fn uprn_hash(uprn: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(uprn.to_le_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

pub fn chunk_for_uprn(uprn: u64, num_chunks: i64) -> i64 {
    (uprn_hash(uprn) % num_chunks as u64) as i64
}

// ============================================================================
// FILE NAMING
// ============================================================================

pub fn chunk_file_name(chunk_id: i64, num_chunks: i64) -> String {
    format!(
        "{}.chunk_{:03}_of_{:03}.csv",
        FLATFILE_STEM, chunk_id, num_chunks
    )
}

/// The full set of chunk paths a run with this partition count produces.
pub fn expected_chunk_files(
    output_dir: &Path,
    num_chunks: i64,
) -> Result<Vec<PathBuf>, PipelineError> {
    if num_chunks < 1 {
        return Err(PipelineError::InvalidChunkCount(num_chunks));
    }
    Ok((0..num_chunks)
        .map(|chunk_id| output_dir.join(chunk_file_name(chunk_id, num_chunks)))
        .collect())
}

// ============================================================================
// WRITER
// ============================================================================

/// Partition rows by UPRN hash and write every chunk file. All chunks
/// are staged as temporary siblings before any is renamed into place, so
/// a failed run leaves the output directory untouched.
pub fn write_chunks(
    output_dir: &Path,
    rows: &[FlatfileRow],
    num_chunks: i64,
) -> Result<Vec<PathBuf>> {
    let final_paths = expected_chunk_files(output_dir, num_chunks)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let mut partitions: Vec<Vec<&FlatfileRow>> = vec![Vec::new(); num_chunks as usize];
    for row in rows {
        partitions[chunk_for_uprn(row.uprn, num_chunks) as usize].push(row);
    }

    let temp_paths: Vec<PathBuf> = final_paths.iter().map(|p| tables::temp_sibling(p)).collect();
    for (temp_path, partition) in temp_paths.iter().zip(&partitions) {
        if let Err(err) = tables::write_rows(temp_path, partition) {
            for staged in &temp_paths {
                let _ = fs::remove_file(staged);
            }
            return Err(err);
        }
    }

    for (temp_path, final_path) in temp_paths.iter().zip(&final_paths) {
        fs::rename(temp_path, final_path)
            .with_context(|| format!("Failed to publish chunk: {}", final_path.display()))?;
    }

    Ok(final_paths)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn create_test_row(uprn: u64, address: &str) -> FlatfileRow {
        FlatfileRow {
            uprn,
            postcode: "AB1 2CD".to_string(),
            address_concat: address.to_string(),
            source: "LPI".to_string(),
            variant_label: "APPROVED".to_string(),
            is_primary: true,
            classification_code: None,
            udprn: None,
            logical_status: Some(1),
            official_flag: None,
            blpu_state: None,
            postal_address_code: Some("D".to_string()),
            parent_uprn: None,
            hierarchy_level: Some("S".to_string()),
        }
    }

    #[test]
    fn test_chunk_count_must_be_positive() {
        assert!(matches!(
            validate_chunk_params(0, 0),
            Err(PipelineError::InvalidChunkCount(0))
        ));
        assert!(matches!(
            validate_chunk_params(-1, 0),
            Err(PipelineError::InvalidChunkCount(-1))
        ));
    }

    #[test]
    fn test_chunk_id_must_be_in_range() {
        assert!(validate_chunk_params(4, 0).is_ok());
        assert!(validate_chunk_params(4, 3).is_ok());
        assert!(matches!(
            validate_chunk_params(4, 4),
            Err(PipelineError::InvalidChunkId { .. })
        ));
        assert!(matches!(
            validate_chunk_params(4, -1),
            Err(PipelineError::InvalidChunkId { .. })
        ));
        assert!(matches!(
            validate_chunk_params(4, 100),
            Err(PipelineError::InvalidChunkId { .. })
        ));
        assert!(validate_chunk_params(200, 100).is_ok());
    }

    #[test]
    fn test_hash_is_stable_across_calls() {
        let first = uprn_hash(10012345678);
        let second = uprn_hash(10012345678);
        assert_eq!(first, second);
        assert_ne!(uprn_hash(1), uprn_hash(2));
    }

    #[test]
    fn test_chunk_assignment_respects_modulus() {
        for uprn in [1u64, 42, 10012345678, u64::MAX] {
            let chunk = chunk_for_uprn(uprn, 7);
            assert!((0..7).contains(&chunk));
        }
    }

    #[test]
    fn test_file_names_are_zero_padded() {
        assert_eq!(
            chunk_file_name(0, 2),
            "abp_for_uk_address_matcher.chunk_000_of_002.csv"
        );
        assert_eq!(
            chunk_file_name(11, 120),
            "abp_for_uk_address_matcher.chunk_011_of_120.csv"
        );
    }

    #[test]
    fn test_single_chunk_still_carries_chunk_suffix() {
        let files = expected_chunk_files(Path::new("/out"), 1).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0]
            .to_string_lossy()
            .ends_with("abp_for_uk_address_matcher.chunk_000_of_001.csv"));
    }

    #[test]
    fn test_written_chunks_partition_the_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<FlatfileRow> = (0..50)
            .map(|i| create_test_row(100 + i, &format!("{} HIGH STREET", i)))
            .collect();

        let paths = write_chunks(dir.path(), &rows, 3).unwrap();
        assert_eq!(paths.len(), 3);

        let mut seen: Vec<FlatfileRow> = Vec::new();
        for path in &paths {
            let chunk: Vec<FlatfileRow> = tables::read_table(path).unwrap();
            seen.extend(chunk);
        }

        // Union of chunks equals the input, with no UPRN in two chunks
        assert_eq!(seen.len(), rows.len());
        let input_uprns: HashSet<u64> = rows.iter().map(|r| r.uprn).collect();
        let output_uprns: HashSet<u64> = seen.iter().map(|r| r.uprn).collect();
        assert_eq!(input_uprns, output_uprns);
    }

    #[test]
    fn test_same_uprn_lands_in_same_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            create_test_row(100, "10 HIGH STREET"),
            create_test_row(100, "ACME LTD 10 HIGH STREET"),
        ];

        let paths = write_chunks(dir.path(), &rows, 5).unwrap();
        let mut non_empty = 0;
        for path in &paths {
            let chunk: Vec<FlatfileRow> = tables::read_table(path).unwrap();
            if !chunk.is_empty() {
                assert_eq!(chunk.len(), 2);
                non_empty += 1;
            }
        }
        assert_eq!(non_empty, 1);
    }

    #[test]
    fn test_no_temp_files_survive_a_write() {
        let dir = tempfile::tempdir().unwrap();
        write_chunks(&dir.path().join("out"), &[create_test_row(1, "A")], 2).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
    }
}
