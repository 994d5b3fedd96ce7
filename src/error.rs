//! Error types for the aria library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during aria operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parse error occurred while reading input data.
    #[error("{0}")]
    Parse(String),

    /// A validation constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// A required input artefact is absent or empty.
    #[error("stage {stage}: missing or empty input: {path}")]
    MissingData { stage: String, path: PathBuf },

    /// The BED references a transcript absent from the catalogue.
    /// Logged and dropped; only fatal when the filtered BED becomes empty.
    #[error("transcript not in catalogue: {0}")]
    MissingTranscript(String),

    /// Random placement did not converge for a transcript.
    #[error(
        "shuffle failed to place regions for transcript {transcript} after {attempts} attempts"
    )]
    ShuffleFailed { transcript: String, attempts: u32 },

    /// Fewer than 7 non-zero channels in the triplet spectrum.
    #[error("mutation context spectrum too sparse: {channels} non-zero channels (needs 7)")]
    SpectrumTooSparse { channels: usize },

    /// Zero mutations intersect the target regions; the comparison is undefined.
    #[error("no mutations intersect the target regions")]
    NoTargetMutations,

    /// Output artefact already exists and overwriting is disabled.
    #[error("output already exists: {0}")]
    FileExists(PathBuf),
}
