// ============================================================
// Layer 4: Training Dataset
// ============================================================
// Implements Burn's Dataset trait over the annotation records.
// Each index produces one Example:
//
//   meta:     desc_id, desc, vid_name, duration, ts (verbatim)
//   features: query_feat -> Sequence [<= max_desc_len, D_q]
//             video_feat -> Pooled [D_v]  or Absent
//             sub_feat   -> Pooled [D_s]  or Absent
//
// Nothing is cached: every call reads the stores again, so the
// result depends only on (index, configuration).
//
// Reference: Burn Book §4 (Datasets)

use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::config::DatasetConfig;
use crate::data::features::{FeatureExtractor, FeatureStores};
use crate::data::splitter::take_fraction;
use crate::domain::example::{Example, ExampleMeta, QueryMeta};
use crate::domain::feature::FeatureKey;
use crate::domain::record::Record;
use crate::domain::traits::RecordSource;
use crate::error::{DataError, Result};

/// Query records paired with the stores their features live in.
#[derive(Debug, Clone)]
pub struct RetrievalDataset {
    dset_name: String,
    records:   Arc<Vec<Record>>,
    extractor: FeatureExtractor,
}

impl RetrievalDataset {
    /// Build a training dataset over `records`.
    ///
    /// Applies `data_ratio` (leading prefix), opens the stores the
    /// context mode needs, and checks every record carries the
    /// `vid_name` and `duration` that training requires.
    pub fn new(config: &DatasetConfig, records: Vec<Record>, stores: &FeatureStores) -> Result<Self> {
        let extractor = FeatureExtractor::new(config, stores)?;
        let records   = take_fraction(records, config.data_ratio)?;

        if let Some(bad) = records.iter().find(|r| r.vid_name.is_none() || r.duration.is_none()) {
            return Err(DataError::config(format!(
                "training record {} is missing vid_name or duration",
                bad.desc_id
            )));
        }

        tracing::info!(
            "Training dataset '{}' ready: {} examples, ctx_mode={} (video={}, sub={})",
            config.dset_name,
            records.len(),
            config.ctx_mode,
            extractor.uses_video(),
            extractor.uses_sub()
        );

        Ok(Self {
            dset_name: config.dset_name.clone(),
            records:   Arc::new(records),
            extractor,
        })
    }

    /// Load the records from `source` and build the dataset.
    pub fn from_source(
        config: &DatasetConfig,
        source: &impl RecordSource,
        stores: &FeatureStores,
    ) -> Result<Self> {
        Self::new(config, source.load_records()?, stores)
    }

    pub fn dset_name(&self) -> &str {
        &self.dset_name
    }

    /// Records after data-ratio truncation, in dataset order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Build the example at `index`, propagating any store error.
    pub fn example(&self, index: usize) -> Result<Example> {
        let record = self.records.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })?;
        let vid_name = record.vid_name.as_deref().ok_or_else(|| {
            DataError::config(format!("record {} has no vid_name", record.desc_id))
        })?;

        let meta = QueryMeta {
            desc_id:  record.desc_id,
            desc:     record.desc.clone(),
            vid_name: Some(vid_name.to_string()),
            duration: record.duration,
            ts:       record.ts,
        };

        let example = Example::new(ExampleMeta::Query(meta))
            .with_feature(FeatureKey::Query, self.extractor.query_feature(record.desc_id)?)
            .with_feature(FeatureKey::Video, self.extractor.video_feature(vid_name)?)
            .with_feature(FeatureKey::Sub, self.extractor.sub_feature(vid_name)?);

        Ok(example)
    }
}

impl Dataset<Example> for RetrievalDataset {
    /// # Panics
    /// Panics if the example cannot be built (missing key, empty
    /// feature). The store is assumed complete for the whole run,
    /// so this is a setup error rather than something to skip.
    fn get(&self, index: usize) -> Option<Example> {
        if index >= self.records.len() {
            return None;
        }
        match self.example(index) {
            Ok(example) => Some(example),
            Err(e) => panic!("cannot build training example {index}: {e}"),
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
