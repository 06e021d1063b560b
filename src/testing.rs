//! Fixture helpers shared by the unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use safetensors::tensor::TensorView;
use safetensors::Dtype;

use crate::domain::feature::FeatureArray;
use crate::domain::record::Record;

/// Write a safetensors file with one f32 `[rows, dim]` tensor per entry.
pub fn write_store(dir: &Path, file_name: &str, entries: &[(&str, Vec<Vec<f32>>)]) -> PathBuf {
    let encoded: Vec<(&str, Dtype, Vec<usize>, Vec<u8>)> = entries
        .iter()
        .map(|(key, rows)| {
            let dim   = rows.first().map(|r| r.len()).unwrap_or(0);
            let bytes = rows.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
            (*key, Dtype::F32, vec![rows.len(), dim], bytes)
        })
        .collect();
    write_raw_store(dir, file_name, &encoded)
}

/// Write a safetensors file from already-encoded tensors of any dtype and rank.
pub fn write_raw_store(
    dir:       &Path,
    file_name: &str,
    entries:   &[(&str, Dtype, Vec<usize>, Vec<u8>)],
) -> PathBuf {
    let mut views = HashMap::new();
    for (key, dtype, shape, bytes) in entries {
        views.insert(key.to_string(), TensorView::new(*dtype, shape.clone(), bytes).unwrap());
    }

    let path = dir.join(file_name);
    safetensors::tensor::serialize_to_file(&views, &None, &path).unwrap();
    path
}

/// Write a store byte by byte from a literal JSON header, bypassing the
/// safetensors writer so inconsistent headers can be produced.
pub fn write_header_store(dir: &Path, file_name: &str, header: &str, data: &[u8]) -> PathBuf {
    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(data);

    let path = dir.join(file_name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// `rows` copies of `[value; dim]`.
pub fn constant(rows: usize, dim: usize, value: f32) -> FeatureArray {
    FeatureArray::new(vec![value; rows * dim], rows, dim).unwrap()
}

/// A fully annotated training record.
pub fn record(desc_id: i64, vid_name: &str) -> Record {
    Record {
        desc_id,
        desc:     format!("query {desc_id}"),
        vid_name: Some(vid_name.to_string()),
        duration: Some(30.0),
        ts:       None,
    }
}
