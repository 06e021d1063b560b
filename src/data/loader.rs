// ============================================================
// Layer 4: Record Loader
// ============================================================
// Reads the two JSON inputs of the data layer:
//
//   1. Annotation file (JSON lines), one query per line:
//        {"desc_id": 1, "desc": "...", "vid_name": "...",
//         "duration": 61.0, "ts": [12.1, 20.4]}
//
//   2. Video index file (one JSON document), per split:
//        {"val": {"vid_a": [61.0, 0], "vid_b": [88.5, 1]},
//         "test": {...}}
//      Each value is [duration, ranking index].
//
// Blank lines in the annotation file are skipped; any other
// malformed line is an error carrying its line number.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::domain::record::{Record, VideoEntry};
use crate::domain::traits::RecordSource;
use crate::error::{DataError, Result};

/// Loads query records from a JSON-lines file.
/// Implements the RecordSource trait from Layer 3.
pub struct JsonlRecordLoader {
    path: PathBuf,
}

impl JsonlRecordLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonlRecordLoader {
    fn load_records(&self) -> Result<Vec<Record>> {
        let io_err = |source| DataError::RecordIo { path: self.path.clone(), source };

        let file   = fs::File::open(&self.path).map_err(io_err)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|source| {
                DataError::RecordParse { path: self.path.clone(), line: i + 1, source }
            })?;
            records.push(record);
        }

        tracing::info!("Loaded {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

/// Read the videos of one evaluation split from the video index file.
///
/// Entries are returned ordered by their ranking index so that
/// context item `i` lines up with column `i` of the ranking matrix.
pub fn load_video_index(path: impl AsRef<Path>, split: &str) -> Result<Vec<VideoEntry>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| DataError::RecordIo {
        path: path.to_path_buf(),
        source,
    })?;

    let mut splits: HashMap<String, HashMap<String, (f64, usize)>> =
        serde_json::from_str(&json).map_err(|source| DataError::RecordParse {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })?;

    let videos = splits.remove(split).ok_or_else(|| {
        DataError::config(format!(
            "split '{split}' not found in video index '{}'",
            path.display()
        ))
    })?;

    let mut entries: Vec<VideoEntry> = videos
        .into_iter()
        .map(|(vid_name, (duration, index))| VideoEntry { vid_name, duration, index })
        .collect();
    entries.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.vid_name.cmp(&b.vid_name)));

    tracing::debug!("Video index '{}' split '{}': {} videos", path.display(), split, entries.len());
    Ok(entries)
}
