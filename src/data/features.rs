// ============================================================
// Layer 4: Feature Extractor
// ============================================================
// Turns store lookups into per-modality features. Shared by the
// training dataset and both evaluation views, so the rules are
// identical everywhere:
//
//   query_feat  store[str(desc_id)][..max_desc_len]
//               -> optional L2 norm (tfeat)         -> Sequence
//
//   video_feat  mean(store[vid_name][..max_ctx_len])
//               -> optional L2 norm (vfeat)         -> Pooled
//
//   sub_feat    mean(store[vid_name][..max_ctx_len])
//               -> optional L2 norm (tfeat)         -> Pooled
//
// A modality whose flag is off yields Feature::Absent and its
// store is never opened.

use std::sync::Arc;

use crate::config::DatasetConfig;
use crate::data::normalizer::{l2_normalize, l2_normalize_rows, mean_pool};
use crate::domain::feature::Feature;
use crate::domain::traits::FeatureSource;
use crate::error::{DataError, Result};
use crate::infra::feature_store::StoreSource;

/// The three stores a dataset may read from.
#[derive(Debug, Clone)]
pub struct FeatureStores {
    /// Query token embeddings, keyed by desc_id
    pub query: StoreSource,
    /// Clip-level video features, keyed by vid_name
    pub video: Option<StoreSource>,
    /// Clip-level subtitle embeddings, keyed by vid_name
    pub sub:   Option<StoreSource>,
}

impl FeatureStores {
    pub fn new(query: StoreSource) -> Self {
        Self { query, video: None, sub: None }
    }

    pub fn with_video(mut self, video: StoreSource) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_sub(mut self, sub: StoreSource) -> Self {
        self.sub = Some(sub);
        self
    }
}

/// Resolved store handles plus the truncation / normalisation rules.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    query:           Arc<dyn FeatureSource>,
    video:           Option<Arc<dyn FeatureSource>>,
    sub:             Option<Arc<dyn FeatureSource>>,
    max_desc_len:    usize,
    max_ctx_len:     usize,
    normalize_vfeat: bool,
    normalize_tfeat: bool,
}

impl FeatureExtractor {
    /// Validate `config` and open (or reuse) every store it needs.
    pub fn new(config: &DatasetConfig, stores: &FeatureStores) -> Result<Self> {
        config.validate()?;
        let mode = config.ctx_mode;

        let query = stores.query.resolve()?;
        let video = if mode.video {
            let source = stores.video.as_ref().ok_or_else(|| {
                DataError::config("context mode includes 'video' but no video store was given")
            })?;
            Some(source.resolve()?)
        } else {
            None
        };
        let sub = if mode.sub {
            let source = stores.sub.as_ref().ok_or_else(|| {
                DataError::config("context mode includes 'sub' but no subtitle store was given")
            })?;
            Some(source.resolve()?)
        } else {
            None
        };

        if mode.tef {
            tracing::warn!("Context mode '{}' includes 'tef': no feature is produced for it here", mode);
        }

        Ok(Self {
            query,
            video,
            sub,
            max_desc_len:    config.max_desc_len,
            max_ctx_len:     config.max_ctx_len,
            normalize_vfeat: config.normalize_vfeat,
            normalize_tfeat: config.normalize_tfeat,
        })
    }

    /// Truncated, optionally normalised query tokens for `desc_id`.
    pub fn query_feature(&self, desc_id: i64) -> Result<Feature> {
        let mut feat = self.query.lookup(&desc_id.to_string())?;
        feat.truncate_rows(self.max_desc_len);
        if self.normalize_tfeat {
            l2_normalize_rows(&mut feat);
        }
        Ok(Feature::Sequence(feat))
    }

    /// Pooled video feature for `vid_name`, or Absent when video is off.
    pub fn video_feature(&self, vid_name: &str) -> Result<Feature> {
        match &self.video {
            Some(store) => self.pooled(store.as_ref(), vid_name, self.normalize_vfeat),
            None        => Ok(Feature::Absent),
        }
    }

    /// Pooled subtitle feature for `vid_name`, or Absent when sub is off.
    pub fn sub_feature(&self, vid_name: &str) -> Result<Feature> {
        match &self.sub {
            Some(store) => self.pooled(store.as_ref(), vid_name, self.normalize_tfeat),
            None        => Ok(Feature::Absent),
        }
    }

    pub fn uses_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn uses_sub(&self) -> bool {
        self.sub.is_some()
    }

    fn pooled(&self, store: &dyn FeatureSource, key: &str, normalize: bool) -> Result<Feature> {
        let mut clips = store.lookup(key)?;
        clips.truncate_rows(self.max_ctx_len);
        let mut pooled = mean_pool(&clips, store.name(), key)?;
        if normalize {
            l2_normalize(pooled.view_mut());
        }
        Ok(Feature::Pooled(pooled.to_vec()))
    }
}
