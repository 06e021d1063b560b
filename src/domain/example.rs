// ============================================================
// Layer 3: Example Domain Type
// ============================================================
// One item produced by a dataset for a single index.
//
//   Training example      -> Query meta + query/video/sub features
//   Query eval example    -> Query meta (no ground truth by default)
//                            + query feature
//   Context eval example  -> Video meta + video/sub features
//
// Metadata travels through collation untouched, so the batch
// keeps a plain Vec<ExampleMeta> next to its tensors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::feature::{Feature, FeatureKey};
use crate::domain::record::Span;

/// Metadata for a query-side example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub desc_id:  i64,
    pub desc:     String,
    /// Ground-truth video; withheld in evaluation unless opted in
    pub vid_name: Option<String>,
    pub duration: Option<f64>,
    pub ts:       Option<Span>,
}

/// Metadata for a video-side (context) example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub vid_name: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExampleMeta {
    Query(QueryMeta),
    Video(VideoMeta),
}

impl ExampleMeta {
    /// Query id, None for video entries.
    pub fn desc_id(&self) -> Option<i64> {
        match self {
            ExampleMeta::Query(q) => Some(q.desc_id),
            ExampleMeta::Video(_) => None,
        }
    }

    /// Video name if this entry exposes one.
    pub fn vid_name(&self) -> Option<&str> {
        match self {
            ExampleMeta::Query(q) => q.vid_name.as_deref(),
            ExampleMeta::Video(v) => Some(&v.vid_name),
        }
    }
}

/// Metadata plus one feature per modality key.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub meta:     ExampleMeta,
    pub features: BTreeMap<FeatureKey, Feature>,
}

impl Example {
    pub fn new(meta: ExampleMeta) -> Self {
        Self { meta, features: BTreeMap::new() }
    }

    /// Builder-style insert used by the datasets.
    pub fn with_feature(mut self, key: FeatureKey, feature: Feature) -> Self {
        self.features.insert(key, feature);
        self
    }

    pub fn feature(&self, key: FeatureKey) -> Option<&Feature> {
        self.features.get(&key)
    }

    /// Feature keys in a stable order.
    pub fn keys(&self) -> impl Iterator<Item = FeatureKey> + '_ {
        self.features.keys().copied()
    }
}
