// ============================================================
// Layer 4: Retrieval Batcher
// ============================================================
// Implements Burn's Batcher trait to merge a Vec<Example> into
// one RetrievalBatch.
//
// Per feature key, every example must agree on the variant:
//
//   Sequence [L_i, D] -> Padded  feat [N, L_max, D] (zeros past L_i)
//                                mask [N, L_max]    (true on real rows)
//                                lengths [L_1 .. L_N]
//   Pooled   [D]      -> Stacked [N, D]
//   Absent            -> Absent
//
// Metadata is copied out in input order, so row i of every
// tensor belongs to meta[i].
//
// Reference: Burn Book §4 (Batcher)
//            ndarray documentation (slicing with s![..])

use std::collections::BTreeMap;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use ndarray::{s, Array2, Array3};

use crate::domain::example::{Example, ExampleMeta};
use crate::domain::feature::{Feature, FeatureArray, FeatureKey};
use crate::error::{DataError, Result};

// ─── BatchFeature ─────────────────────────────────────────────────────────────
/// One modality of a batch.
#[derive(Debug, Clone)]
pub enum BatchFeature<B: Backend> {
    /// Variable-length sequences padded to the longest in the batch
    Padded {
        /// `[batch, max_len, dim]`
        feat:    Tensor<B, 3>,
        /// `[batch, max_len]`, true on real rows
        mask:    Tensor<B, 2, Bool>,
        /// Real length of each row before padding
        lengths: Vec<usize>,
    },
    /// Fixed-size vectors, `[batch, dim]`
    Stacked(Tensor<B, 2>),
    /// Modality absent in every example
    Absent,
}

// ─── RetrievalBatch ───────────────────────────────────────────────────────────
/// A collated batch. All tensors have batch size as their first dimension.
#[derive(Debug, Clone)]
pub struct RetrievalBatch<B: Backend> {
    /// Per-example metadata, same order as the tensor rows
    pub meta:     Vec<ExampleMeta>,
    pub features: BTreeMap<FeatureKey, BatchFeature<B>>,
}

impl<B: Backend> RetrievalBatch<B> {
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn feature(&self, key: FeatureKey) -> Option<&BatchFeature<B>> {
        self.features.get(&key)
    }
}

// ─── collate ──────────────────────────────────────────────────────────────────
/// Merge `items` into one batch on `device`.
///
/// Fails with `EmptyBatch` for no items and `ShapeMismatch` when the
/// examples disagree on keys, variants or feature dims.
pub fn collate<B: Backend>(items: Vec<Example>, device: &B::Device) -> Result<RetrievalBatch<B>> {
    let first = items.first().ok_or(DataError::EmptyBatch)?;
    let keys: Vec<FeatureKey> = first.keys().collect();

    for item in &items[1..] {
        check_same_keys(first, item)?;
    }

    let mut features = BTreeMap::new();
    for key in keys {
        let column: Vec<&Feature> = items
            .iter()
            .filter_map(|item| item.feature(key))
            .collect();
        features.insert(key, collate_column::<B>(key, &column, device)?);
    }

    let meta: Vec<ExampleMeta> = items.into_iter().map(|item| item.meta).collect();
    tracing::debug!("Collated batch of {} examples, {} feature keys", meta.len(), features.len());

    Ok(RetrievalBatch { meta, features })
}

fn check_same_keys(first: &Example, other: &Example) -> Result<()> {
    let expected: Vec<FeatureKey> = first.keys().collect();
    let found:    Vec<FeatureKey> = other.keys().collect();
    if expected == found {
        return Ok(());
    }

    // Name the first key present on one side only
    let key = expected
        .iter()
        .chain(found.iter())
        .find(|k| !(expected.contains(k) && found.contains(k)))
        .map(|k| k.name().to_string())
        .unwrap_or_else(|| "feature keys".to_string());

    Err(DataError::ShapeMismatch {
        key,
        expected: vec![expected.len()],
        found:    vec![found.len()],
    })
}

fn collate_column<B: Backend>(
    key:    FeatureKey,
    column: &[&Feature],
    device: &B::Device,
) -> Result<BatchFeature<B>> {
    match column[0] {
        Feature::Sequence(_) => {
            let seqs = column
                .iter()
                .map(|f| match f {
                    Feature::Sequence(a) => Ok(a),
                    other => Err(mismatch(key, column[0], other)),
                })
                .collect::<Result<Vec<&FeatureArray>>>()?;
            pad_sequences::<B>(key, &seqs, device)
        }
        Feature::Pooled(_) => {
            let vecs = column
                .iter()
                .map(|f| match f {
                    Feature::Pooled(v) => Ok(v.as_slice()),
                    other => Err(mismatch(key, column[0], other)),
                })
                .collect::<Result<Vec<&[f32]>>>()?;
            stack_vectors::<B>(key, &vecs, device)
        }
        Feature::Absent => {
            if let Some(present) = column.iter().find(|f| !f.is_absent()) {
                return Err(mismatch(key, column[0], present));
            }
            Ok(BatchFeature::Absent)
        }
    }
}

fn mismatch(key: FeatureKey, expected: &Feature, found: &Feature) -> DataError {
    DataError::ShapeMismatch {
        key:      key.name().to_string(),
        expected: expected.shape().unwrap_or_default(),
        found:    found.shape().unwrap_or_default(),
    }
}

/// Zero-pad to the longest sequence and build the validity mask.
fn pad_sequences<B: Backend>(
    key:    FeatureKey,
    seqs:   &[&FeatureArray],
    device: &B::Device,
) -> Result<BatchFeature<B>> {
    let dim = seqs[0].dim();
    if let Some(bad) = seqs.iter().find(|s| s.dim() != dim) {
        return Err(DataError::ShapeMismatch {
            key:      key.name().to_string(),
            expected: vec![dim],
            found:    vec![bad.dim()],
        });
    }

    let batch_size = seqs.len();
    let lengths: Vec<usize> = seqs.iter().map(|s| s.rows()).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);

    let mut padded = Array3::<f32>::zeros((batch_size, max_len, dim));
    let mut valid  = Array2::<bool>::from_elem((batch_size, max_len), false);
    for (i, seq) in seqs.iter().enumerate() {
        padded.slice_mut(s![i, ..seq.rows(), ..]).assign(&seq.view());
        valid.slice_mut(s![i, ..seq.rows()]).fill(true);
    }

    let feat = Tensor::<B, 3>::from_data(
        TensorData::new(padded.iter().copied().collect::<Vec<f32>>(), [batch_size, max_len, dim]),
        device,
    );
    let mask = Tensor::<B, 2, Bool>::from_data(
        TensorData::new(valid.iter().copied().collect::<Vec<bool>>(), [batch_size, max_len]),
        device,
    );

    Ok(BatchFeature::Padded { feat, mask, lengths })
}

/// Stack equal-length vectors into `[batch, dim]`.
fn stack_vectors<B: Backend>(
    key:    FeatureKey,
    vecs:   &[&[f32]],
    device: &B::Device,
) -> Result<BatchFeature<B>> {
    let dim = vecs[0].len();
    if let Some(bad) = vecs.iter().find(|v| v.len() != dim) {
        return Err(DataError::ShapeMismatch {
            key:      key.name().to_string(),
            expected: vec![dim],
            found:    vec![bad.len()],
        });
    }

    let flat: Vec<f32> = vecs.iter().flat_map(|v| v.iter().copied()).collect();
    let stacked = Tensor::<B, 2>::from_data(TensorData::new(flat, [vecs.len(), dim]), device);
    Ok(BatchFeature::Stacked(stacked))
}

// ─── RetrievalBatcher ─────────────────────────────────────────────────────────
/// Holds the device tensors are created on.
#[derive(Clone, Debug)]
pub struct RetrievalBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> RetrievalBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each sampled group.
impl<B: Backend> Batcher<Example, RetrievalBatch<B>> for RetrievalBatcher<B> {
    /// # Panics
    /// Panics when [`collate`] fails; a malformed batch is fatal.
    fn batch(&self, items: Vec<Example>) -> RetrievalBatch<B> {
        match collate(items, &self.device) {
            Ok(batch) => batch,
            Err(e) => panic!("cannot collate batch: {e}"),
        }
    }
}
