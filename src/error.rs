// ============================================================
// Error Taxonomy
// ============================================================
// Every failure the data layer can produce. None of these are
// retried: the stores and index files are assumed complete and
// static for a run, so any inconsistency is a setup bug that
// surfaces immediately.
//
//   StoreOpen / StoreFormat  -> fatal at dataset construction
//   StoreRead                -> store changed or failed after open
//   KeyNotFound / EmptyFeature -> fatal for one example
//   IndexOutOfRange          -> caller asked past the end
//   ShapeMismatch / EmptyBatch -> fatal for one batch
//   Configuration            -> bad flags, modes or ratios
//   RecordIo / RecordParse   -> unreadable input files

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening stores, building examples or collating batches.
#[derive(Debug, Error)]
pub enum DataError {
    /// The store path is missing or unreadable.
    #[error("cannot open feature store '{path}': {source}")]
    StoreOpen {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file opened but is not a usable keyed array store.
    #[error("invalid feature store '{path}': {reason}")]
    StoreFormat { path: PathBuf, reason: String },

    /// A lookup in an already-open store failed at the I/O level.
    #[error("cannot read key '{key}' from feature store '{path}': {source}")]
    StoreRead {
        path:   PathBuf,
        key:    String,
        #[source]
        source: std::io::Error,
    },

    /// A video, subtitle or query key is absent from its store.
    #[error("key '{key}' not found in feature store '{store}'")]
    KeyNotFound { store: String, key: String },

    /// A stored array has zero rows, so it cannot be mean-pooled.
    #[error("feature '{key}' in store '{store}' has no rows")]
    EmptyFeature { store: String, key: String },

    /// Features in one batch cannot be stacked together.
    #[error("shape mismatch for '{key}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        key:      String,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },

    /// A dataset was asked for an item past its end.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Collate was called with no examples.
    #[error("cannot collate an empty batch")]
    EmptyBatch,

    /// Invalid mode string, ratio, length limit or missing store.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An input record or index file could not be read.
    #[error("cannot read '{path}': {source}")]
    RecordIo {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input record or index file is not valid JSON.
    #[error("cannot parse '{path}' (line {line}): {source}")]
    RecordParse {
        path:   PathBuf,
        line:   usize,
        #[source]
        source: serde_json::Error,
    },
}

impl DataError {
    /// Shorthand for a [`DataError::Configuration`] with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        DataError::Configuration(msg.into())
    }
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
