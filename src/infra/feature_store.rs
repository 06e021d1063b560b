// ============================================================
// Layer 6: Feature Store
// ============================================================
// Opens a safetensors file of precomputed embeddings and serves
// one 2D array per key:
//
//   query store -> key = desc_id as decimal string, [n_tokens, D_q]
//   video store -> key = vid_name,                  [n_clips,  D_v]
//   sub store   -> key = vid_name,                  [n_clips,  D_s]
//
// File layout (safetensors):
//
//   ┌──────────────┬──────────────────────┬───────────────────────┐
//   │ 8 bytes      │ N bytes              │ raw data bytes        │
//   │ header size  │ JSON header (UTF-8)  │ (contiguous, LE)      │
//   │ (u64 LE)     │                      │                       │
//   └──────────────┴──────────────────────┴───────────────────────┘
//
// Two drivers, chosen when the store is opened:
//
//   Core   - read the whole file once, serve lookups from memory
//   Direct - read only the header, then seek + read per lookup
//
// A dataset receives its stores as an explicit StoreSource:
// either a path it opens (and owns), or an already-open handle
// shared with other datasets through an Arc.
//
// Reference: safetensors crate documentation
//            Rust Book §9 (Error Handling)

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use safetensors::tensor::Metadata;
use safetensors::{Dtype, SafeTensors};
use serde::{Deserialize, Serialize};

use crate::domain::feature::FeatureArray;
use crate::domain::traits::FeatureSource;
use crate::error::{DataError, Result};

/// Size of the little-endian header length prefix.
const HEADER_LEN_BYTES: usize = 8;

/// Headers larger than this are rejected before allocating.
const MAX_HEADER_BYTES: u64 = 100 * 1024 * 1024;

// ─── StoreDriver ──────────────────────────────────────────────────────────────
/// How a store file is accessed after it is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Load the entire file into memory at open time
    #[default]
    Core,
    /// Keep the file open and read each record on demand
    Direct,
}

impl FromStr for StoreDriver {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "core"   => Ok(StoreDriver::Core),
            "direct" => Ok(StoreDriver::Direct),
            other    => Err(DataError::config(format!(
                "unknown store driver '{other}' (expected 'core' or 'direct')"
            ))),
        }
    }
}

// ─── StoreSource ──────────────────────────────────────────────────────────────
/// Where a dataset gets one of its feature stores from.
#[derive(Debug, Clone)]
pub enum StoreSource {
    /// Open a new read-only handle; the dataset owns it
    Open { path: PathBuf, driver: StoreDriver },
    /// Use a handle opened elsewhere; whoever created it keeps it alive
    Shared(Arc<dyn FeatureSource>),
}

impl StoreSource {
    pub fn open(path: impl Into<PathBuf>, driver: StoreDriver) -> Self {
        StoreSource::Open { path: path.into(), driver }
    }

    pub fn shared(handle: Arc<dyn FeatureSource>) -> Self {
        StoreSource::Shared(handle)
    }

    /// Turn the reference into one usable handle, opening a file if needed.
    pub fn resolve(&self) -> Result<Arc<dyn FeatureSource>> {
        match self {
            StoreSource::Open { path, driver } => {
                Ok(Arc::new(FeatureStore::open(path, *driver)?))
            }
            StoreSource::Shared(handle) => {
                tracing::debug!("Reusing shared feature store '{}'", handle.name());
                Ok(Arc::clone(handle))
            }
        }
    }
}

// ─── FeatureStore ─────────────────────────────────────────────────────────────
/// Location and type of one stored array, relative to the data section.
#[derive(Debug, Clone)]
struct IndexEntry {
    dtype: Dtype,
    shape: Vec<usize>,
    start: usize,
    end:   usize,
}

enum Backing {
    Core(Vec<u8>),
    Direct(Mutex<File>),
}

/// A read-only safetensors file mapping keys to 2D arrays.
pub struct FeatureStore {
    path:        PathBuf,
    name:        String,
    driver:      StoreDriver,
    /// Absolute file offset of the first data byte
    data_offset: usize,
    index:       HashMap<String, IndexEntry>,
    backing:     Backing,
}

impl fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStore")
            .field("path", &self.path)
            .field("driver", &self.driver)
            .field("keys", &self.index.len())
            .finish()
    }
}

impl FeatureStore {
    /// Open `path` read-only with the given driver.
    ///
    /// Fails with `StoreOpen` when the file cannot be read and with
    /// `StoreFormat` when its header is not a valid safetensors header.
    pub fn open(path: impl AsRef<Path>, driver: StoreDriver) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();

        let (data_offset, metadata, backing) = match driver {
            StoreDriver::Core   => open_core(&path)?,
            StoreDriver::Direct => open_direct(&path)?,
        };

        let index: HashMap<String, IndexEntry> = metadata
            .tensors()
            .into_iter()
            .map(|(key, info)| {
                let entry = IndexEntry {
                    dtype: info.dtype,
                    shape: info.shape.clone(),
                    start: info.data_offsets.0,
                    end:   info.data_offsets.1,
                };
                (key, entry)
            })
            .collect();

        tracing::info!(
            "Opened feature store '{}' ({} keys, driver={:?})",
            name,
            index.len(),
            driver
        );

        Ok(Self { path, name, driver, data_offset, index, backing })
    }

    fn read_bytes(&self, key: &str, entry: &IndexEntry) -> Result<Vec<u8>> {
        let start = self.data_offset + entry.start;
        let end   = self.data_offset + entry.end;

        match &self.backing {
            Backing::Core(buffer) => Ok(buffer[start..end].to_vec()),
            Backing::Direct(file) => {
                // Every read seeks first, so a poisoned guard is still usable
                let mut file = file.lock().unwrap_or_else(|p| p.into_inner());
                let io_err = |source| DataError::StoreRead {
                    path: self.path.clone(),
                    key:  key.to_string(),
                    source,
                };
                let mut bytes = vec![0u8; end - start];
                file.seek(SeekFrom::Start(start as u64)).map_err(io_err)?;
                file.read_exact(&mut bytes).map_err(io_err)?;
                Ok(bytes)
            }
        }
    }

    fn format_error(&self, reason: impl Into<String>) -> DataError {
        DataError::StoreFormat { path: self.path.clone(), reason: reason.into() }
    }
}

impl FeatureSource for FeatureStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Result<FeatureArray> {
        let entry = self.index.get(key).ok_or_else(|| DataError::KeyNotFound {
            store: self.name.clone(),
            key:   key.to_string(),
        })?;

        // Rank-1 arrays are treated as a single row
        let (rows, dim) = match entry.shape.as_slice() {
            [rows, dim] => (*rows, *dim),
            [dim]       => (1, *dim),
            other       => {
                return Err(self.format_error(format!(
                    "key '{key}' has rank {} (expected 2)", other.len()
                )))
            }
        };

        let float = StoredFloat::of(entry.dtype).ok_or_else(|| {
            self.format_error(format!("key '{key}' has unsupported dtype {:?}", entry.dtype))
        })?;
        let byte_len = rows
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(float.width()))
            .ok_or_else(|| {
                self.format_error(format!("key '{key}' has shape {:?} that overflows", entry.shape))
            })?;
        let stored = entry.end.saturating_sub(entry.start);
        if byte_len != stored {
            return Err(self.format_error(format!(
                "key '{key}' holds {stored} bytes but its shape needs {byte_len}"
            )));
        }

        let data = float.decode(&self.read_bytes(key, entry)?);

        tracing::trace!("Lookup '{}' in '{}': [{}, {}]", key, self.name, rows, dim);
        FeatureArray::new(data, rows, dim)
            .map_err(|_| self.format_error(format!("key '{key}' has truncated data")))
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Read the whole file and parse its header from memory.
fn open_core(path: &Path) -> Result<(usize, Metadata, Backing)> {
    let buffer = std::fs::read(path).map_err(|source| DataError::StoreOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let (header_len, metadata) = SafeTensors::read_metadata(&buffer).map_err(|e| {
        DataError::StoreFormat { path: path.to_path_buf(), reason: e.to_string() }
    })?;

    Ok((HEADER_LEN_BYTES + header_len, metadata, Backing::Core(buffer)))
}

/// Read only the header, keep the file handle for later lookups.
fn open_direct(path: &Path) -> Result<(usize, Metadata, Backing)> {
    let open_err = |source| DataError::StoreOpen { path: path.to_path_buf(), source };
    let format_err = |reason: String| DataError::StoreFormat { path: path.to_path_buf(), reason };

    let mut file = File::open(path).map_err(open_err)?;
    let file_len = file.metadata().map_err(open_err)?.len();

    let mut len_bytes = [0u8; HEADER_LEN_BYTES];
    file.read_exact(&mut len_bytes)
        .map_err(|e| format_err(format!("cannot read header length: {e}")))?;
    let header_len = u64::from_le_bytes(len_bytes);
    if header_len > MAX_HEADER_BYTES || header_len + HEADER_LEN_BYTES as u64 > file_len {
        return Err(format_err(format!("invalid header length {header_len}")));
    }

    let mut header = vec![0u8; header_len as usize];
    file.read_exact(&mut header)
        .map_err(|e| format_err(format!("cannot read header: {e}")))?;
    let metadata: Metadata = serde_json::from_slice(&header)
        .map_err(|e| format_err(format!("invalid header JSON: {e}")))?;

    // Nothing is read eagerly, so check every record fits inside the file now
    let data_offset = HEADER_LEN_BYTES + header_len as usize;
    let data_len = file_len as usize - data_offset;
    if let Some((key, _)) = metadata
        .tensors()
        .into_iter()
        .find(|(_, info)| info.data_offsets.1 > data_len || info.data_offsets.0 > info.data_offsets.1)
    {
        return Err(format_err(format!("record '{key}' extends past end of file")));
    }

    Ok((data_offset, metadata, Backing::Direct(Mutex::new(file))))
}

/// The stored dtypes a lookup can return; F64 is narrowed to f32.
#[derive(Debug, Clone, Copy)]
enum StoredFloat {
    F32,
    F64,
}

impl StoredFloat {
    fn of(dtype: Dtype) -> Option<Self> {
        match dtype {
            Dtype::F32 => Some(StoredFloat::F32),
            Dtype::F64 => Some(StoredFloat::F64),
            _          => None,
        }
    }

    fn width(self) -> usize {
        match self {
            StoredFloat::F32 => 4,
            StoredFloat::F64 => 8,
        }
    }

    /// Little-endian bytes to f32 values.
    fn decode(self, bytes: &[u8]) -> Vec<f32> {
        match self {
            StoredFloat::F32 => bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            StoredFloat::F64 => bytes
                .chunks_exact(8)
                .map(|b| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(b);
                    f64::from_le_bytes(raw) as f32
                })
                .collect(),
        }
    }
}

// ─── InMemoryStore ────────────────────────────────────────────────────────────
/// A FeatureSource backed by a HashMap, for synthetic data and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    name:    String,
    entries: HashMap<String, FeatureArray>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: HashMap::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, array: FeatureArray) {
        self.entries.insert(key.into(), array);
    }

    pub fn with(mut self, key: impl Into<String>, array: FeatureArray) -> Self {
        self.insert(key, array);
        self
    }

    /// Convenience for wrapping into a shared StoreSource.
    pub fn into_source(self) -> StoreSource {
        StoreSource::Shared(Arc::new(self))
    }
}

impl FeatureSource for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Result<FeatureArray> {
        self.entries.get(key).cloned().ok_or_else(|| DataError::KeyNotFound {
            store: self.name.clone(),
            key:   key.to_string(),
        })
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_header_store, write_raw_store, write_store};

    fn sample_store(dir: &Path) -> PathBuf {
        write_store(
            dir,
            "video.safetensors",
            &[
                ("clip_a", vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]),
                ("clip_b", vec![vec![0.5, 0.5]]),
            ],
        )
    }

    #[test]
    fn test_core_driver_lookup() {
        let dir   = tempfile::tempdir().unwrap();
        let path  = sample_store(dir.path());
        let store = FeatureStore::open(&path, StoreDriver::Core).unwrap();

        let a = store.lookup("clip_a").unwrap();
        assert_eq!(a.shape(), [3, 2]);
        assert_eq!(a, FeatureArray::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap());
        assert_eq!(store.len(), 2);
        assert!(store.contains("clip_b"));
    }

    #[test]
    fn test_direct_driver_matches_core() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = sample_store(dir.path());
        let core   = FeatureStore::open(&path, StoreDriver::Core).unwrap();
        let direct = FeatureStore::open(&path, StoreDriver::Direct).unwrap();

        for key in ["clip_a", "clip_b"] {
            assert_eq!(core.lookup(key).unwrap(), direct.lookup(key).unwrap());
        }
    }

    #[test]
    fn test_missing_key_is_key_not_found() {
        let dir   = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(sample_store(dir.path()), StoreDriver::Direct).unwrap();
        match store.lookup("nope") {
            Err(DataError::KeyNotFound { key, .. }) => assert_eq!(key, "nope"),
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_store_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.safetensors");
        for driver in [StoreDriver::Core, StoreDriver::Direct] {
            assert!(matches!(
                FeatureStore::open(&missing, driver),
                Err(DataError::StoreOpen { .. })
            ));
        }
    }

    #[test]
    fn test_garbage_file_is_format_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.safetensors");
        std::fs::write(&path, b"definitely not a store").unwrap();
        for driver in [StoreDriver::Core, StoreDriver::Direct] {
            assert!(matches!(
                FeatureStore::open(&path, driver),
                Err(DataError::StoreFormat { .. })
            ));
        }
    }

    fn f64_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    const DRIVERS: [StoreDriver; 2] = [StoreDriver::Core, StoreDriver::Direct];

    #[test]
    fn test_f64_values_are_narrowed_to_f32() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_raw_store(
            dir.path(),
            "f64.safetensors",
            &[("k", Dtype::F64, vec![2, 2], f64_bytes(&[1.5, -2.0, 0.25, 4.0]))],
        );
        for driver in DRIVERS {
            let a = FeatureStore::open(&path, driver).unwrap().lookup("k").unwrap();
            assert_eq!(a, FeatureArray::new(vec![1.5, -2.0, 0.25, 4.0], 2, 2).unwrap());
        }
    }

    #[test]
    fn test_rank_one_array_is_a_single_row() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_raw_store(
            dir.path(),
            "rank1.safetensors",
            &[("k", Dtype::F32, vec![3], f32_bytes(&[1.0, 2.0, 3.0]))],
        );
        for driver in DRIVERS {
            let a = FeatureStore::open(&path, driver).unwrap().lookup("k").unwrap();
            assert_eq!(a.shape(), [1, 3]);
            assert_eq!(a, FeatureArray::new(vec![1.0, 2.0, 3.0], 1, 3).unwrap());
        }
    }

    #[test]
    fn test_non_float_dtypes_are_format_errors() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_raw_store(
            dir.path(),
            "ints.safetensors",
            &[
                ("half", Dtype::F16, vec![1, 2], vec![0u8; 4]),
                ("long", Dtype::I64, vec![1, 1], 7i64.to_le_bytes().to_vec()),
            ],
        );
        for driver in DRIVERS {
            let store = FeatureStore::open(&path, driver).unwrap();
            for key in ["half", "long"] {
                match store.lookup(key) {
                    Err(DataError::StoreFormat { reason, .. }) => {
                        assert!(reason.contains("unsupported dtype"), "{reason}")
                    }
                    other => panic!("expected StoreFormat for {key}, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_rank_three_array_is_format_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_raw_store(
            dir.path(),
            "rank3.safetensors",
            &[("k", Dtype::F32, vec![1, 2, 2], f32_bytes(&[0.0; 4]))],
        );
        for driver in DRIVERS {
            let store = FeatureStore::open(&path, driver).unwrap();
            assert!(matches!(store.lookup("k"), Err(DataError::StoreFormat { .. })));
        }
    }

    #[test]
    fn test_overflowing_shape_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        // Direct only checks offsets at open time, so the bogus shape
        // reaches the lookup; Core may already reject it when opening.
        let header = r#"{"k":{"dtype":"F32","shape":[4294967296,4294967296],"data_offsets":[0,4]}}"#;
        let path = write_header_store(dir.path(), "huge.safetensors", header, &[0u8; 4]);
        for driver in DRIVERS {
            let result = FeatureStore::open(&path, driver).and_then(|s| s.lookup("k"));
            assert!(matches!(result, Err(DataError::StoreFormat { .. })), "{driver:?}: {result:?}");
        }
    }

    #[test]
    fn test_shape_disagreeing_with_offsets_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let header = r#"{"k":{"dtype":"F32","shape":[2,2],"data_offsets":[0,8]}}"#;
        let path = write_header_store(dir.path(), "short.safetensors", header, &[0u8; 8]);
        let result = FeatureStore::open(&path, StoreDriver::Direct).and_then(|s| s.lookup("k"));
        assert!(matches!(result, Err(DataError::StoreFormat { .. })));
    }

    #[test]
    fn test_direct_read_after_truncation_is_store_read_error() {
        let dir   = tempfile::tempdir().unwrap();
        let path  = sample_store(dir.path());
        let store = FeatureStore::open(&path, StoreDriver::Direct).unwrap();

        // Shrink the file under the open handle so the data section is gone
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(8).unwrap();

        match store.lookup("clip_a") {
            Err(DataError::StoreRead { key, .. }) => assert_eq!(key, "clip_a"),
            other => panic!("expected StoreRead, got {other:?}"),
        }
    }

    #[test]
    fn test_shared_source_reuses_handle() {
        let handle: Arc<dyn FeatureSource> = Arc::new(
            InMemoryStore::new("mem").with("k", FeatureArray::new(vec![1.0], 1, 1).unwrap()),
        );
        let resolved = StoreSource::shared(Arc::clone(&handle)).resolve().unwrap();
        assert!(Arc::ptr_eq(&handle, &resolved));
    }

    #[test]
    fn test_driver_parsing() {
        assert_eq!("core".parse::<StoreDriver>().unwrap(), StoreDriver::Core);
        assert_eq!("direct".parse::<StoreDriver>().unwrap(), StoreDriver::Direct);
        assert!("sec2".parse::<StoreDriver>().is_err());
    }
}
