// 🚨 Pipeline Errors - Run-fatal failure taxonomy
// Every variant aborts the run; the unit of retry is re-invocation

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input file is absent before any work has started
    #[error("missing required inputs under {}: {}. Run the {prerequisite} step first", dir.display(), missing.join(", "))]
    MissingInputs {
        dir: PathBuf,
        missing: Vec<String>,
        prerequisite: &'static str,
    },

    /// Distinct UPRNs were lost (or invented) between input and output
    #[error("lost UPRNs during processing: input {input_uprns}, output {output_uprns}")]
    IntegrityViolation {
        input_uprns: usize,
        output_uprns: usize,
    },

    /// Chunk count outside the valid range
    #[error("num_chunks must be >= 1, got {0}")]
    InvalidChunkCount(i64),

    /// Chunk id outside [0, num_chunks)
    #[error("chunk_id must be in range 0..{num_chunks}, got {chunk_id}")]
    InvalidChunkId { num_chunks: i64, chunk_id: i64 },

    /// Downloaded bytes do not match the manifest checksum
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

impl PipelineError {
    /// Build a MissingInputs error from the file names that were not found
    pub fn missing_inputs(dir: &std::path::Path, missing: Vec<String>, prerequisite: &'static str) -> Self {
        PipelineError::MissingInputs {
            dir: dir.to_path_buf(),
            missing,
            prerequisite,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
