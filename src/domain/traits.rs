// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The datasets only ever talk to these traits:
//
//   FeatureSource - a keyed array store (safetensors file on
//                   disk, or an in-memory map in tests)
//   RecordSource  - anything that yields the query records
//                   (JSON-lines file today)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::fmt;

use crate::domain::feature::FeatureArray;
use crate::domain::record::Record;
use crate::error::Result;

// ─── FeatureSource ────────────────────────────────────────────────────────────
/// A read-only mapping from string keys to 2D feature arrays.
///
/// Implementations must be safe to share between loader workers,
/// hence the `Send + Sync` bound.
///
/// Implementations:
///   - FeatureStore  -> safetensors file (infra layer)
///   - InMemoryStore -> HashMap, for synthetic data and tests
pub trait FeatureSource: Send + Sync + fmt::Debug {
    /// Human-readable name used in logs and error messages
    fn name(&self) -> &str;

    /// Fetch the array stored under `key`.
    /// Fails with `DataError::KeyNotFound` when the key is absent.
    fn lookup(&self, key: &str) -> Result<FeatureArray>;

    /// Whether `key` exists, without reading its data
    fn contains(&self, key: &str) -> bool;

    /// Number of stored keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the list of query records.
pub trait RecordSource {
    /// Load every record, in file order.
    fn load_records(&self) -> Result<Vec<Record>>;
}
