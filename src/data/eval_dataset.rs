// ============================================================
// Layer 4: Evaluation Datasets
// ============================================================
// Evaluation needs two different item streams over one split:
//
//   Query view   - one item per query: desc_id, desc and the
//                  query_feat sequence. The ground-truth video
//                  is withheld unless explicitly requested.
//
//   Context view - one item per distinct video of the split:
//                  vid_name, duration and pooled video/sub
//                  features, independent of any query.
//
// The ranking code scores every query against every context
// item, so the two views have unrelated lengths.
//
// Both views are cheap read-only handles over one shared
// RetrievalEvalData (records, video list, open stores). Pick the
// view you want up front; there is no mode to forget to switch.
//
// Reference: Burn Book §4 (Datasets)

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::config::{DatasetConfig, EvalConfig, EvalMode};
use crate::data::features::{FeatureExtractor, FeatureStores};
use crate::data::loader::{load_video_index, JsonlRecordLoader};
use crate::data::splitter::take_fraction;
use crate::domain::example::{Example, ExampleMeta, QueryMeta, VideoMeta};
use crate::domain::feature::FeatureKey;
use crate::domain::record::{Record, VideoEntry};
use crate::domain::traits::RecordSource;
use crate::error::{DataError, Result};

#[derive(Debug)]
struct EvalShared {
    dset_name: String,
    split:     String,
    queries:   Vec<Record>,
    videos:    Vec<VideoEntry>,
    video2idx: HashMap<String, usize>,
    extractor: FeatureExtractor,
}

// ─── RetrievalEvalData ────────────────────────────────────────────────────────
/// Everything one evaluation split needs, shared by its views.
#[derive(Debug, Clone)]
pub struct RetrievalEvalData {
    shared: Arc<EvalShared>,
}

impl RetrievalEvalData {
    /// Build evaluation data for `split`.
    ///
    /// `data_ratio` truncates the queries only; every video of the
    /// split stays so the ranking covers the full corpus.
    pub fn new(
        config:  &DatasetConfig,
        split:   &str,
        queries: Vec<Record>,
        videos:  Vec<VideoEntry>,
        stores:  &FeatureStores,
    ) -> Result<Self> {
        let extractor = FeatureExtractor::new(config, stores)?;
        let queries   = take_fraction(queries, config.data_ratio)?;

        let video2idx: HashMap<String, usize> =
            videos.iter().map(|v| (v.vid_name.clone(), v.index)).collect();
        if video2idx.len() != videos.len() {
            return Err(DataError::config(format!(
                "video index for split '{split}' lists a video more than once"
            )));
        }

        tracing::info!(
            "Eval data '{}' split '{}': {} queries, {} videos, ctx_mode={} (video={}, sub={})",
            config.dset_name,
            split,
            queries.len(),
            videos.len(),
            config.ctx_mode,
            extractor.uses_video(),
            extractor.uses_sub()
        );

        Ok(Self {
            shared: Arc::new(EvalShared {
                dset_name: config.dset_name.clone(),
                split: split.to_string(),
                queries,
                videos,
                video2idx,
                extractor,
            }),
        })
    }

    /// Read queries from a JSON-lines file and the split's videos from
    /// the index file, then apply the ground-truth opt-in check early.
    pub fn from_files(
        config:           &EvalConfig,
        data_path:        impl AsRef<Path>,
        video_index_path: impl AsRef<Path>,
        stores:           &FeatureStores,
    ) -> Result<Self> {
        config.validate()?;
        let split   = config.eval_split_name.as_str();
        let queries = JsonlRecordLoader::new(data_path.as_ref()).load_records()?;
        let videos  = load_video_index(video_index_path, split)?;
        let data    = Self::new(&config.dataset, split, queries, videos, stores)?;
        if config.load_gt_video {
            data.query_view().with_ground_truth_video()?;
        }
        Ok(data)
    }

    pub fn dset_name(&self) -> &str {
        &self.shared.dset_name
    }

    pub fn split(&self) -> &str {
        &self.shared.split
    }

    pub fn num_queries(&self) -> usize {
        self.shared.queries.len()
    }

    pub fn num_videos(&self) -> usize {
        self.shared.videos.len()
    }

    /// Videos of the split, ordered by ranking index.
    pub fn videos(&self) -> &[VideoEntry] {
        &self.shared.videos
    }

    /// Ranking index of `vid_name`, as listed in the video index file.
    pub fn video_index(&self, vid_name: &str) -> Option<usize> {
        self.shared.video2idx.get(vid_name).copied()
    }

    /// Per-query view without ground-truth video names.
    pub fn query_view(&self) -> QueryEvalDataset {
        QueryEvalDataset { shared: Arc::clone(&self.shared), load_gt_video: false }
    }

    /// Per-video view.
    pub fn context_view(&self) -> ContextEvalDataset {
        ContextEvalDataset { shared: Arc::clone(&self.shared) }
    }

    /// View selected by `mode`.
    pub fn view(&self, mode: EvalMode) -> EvalView {
        match mode {
            EvalMode::Query   => EvalView::Query(self.query_view()),
            EvalMode::Context => EvalView::Context(self.context_view()),
        }
    }
}

// ─── QueryEvalDataset ─────────────────────────────────────────────────────────
/// One item per query of the split.
#[derive(Debug, Clone)]
pub struct QueryEvalDataset {
    shared:        Arc<EvalShared>,
    load_gt_video: bool,
}

impl QueryEvalDataset {
    /// Attach the ground-truth `vid_name` to every item.
    ///
    /// Only meant for single-video moment localisation; fails when the
    /// split's records do not carry video names.
    pub fn with_ground_truth_video(mut self) -> Result<Self> {
        if let Some(bad) = self.shared.queries.iter().find(|r| r.vid_name.is_none()) {
            return Err(DataError::config(format!(
                "cannot load ground-truth videos: query {} has no vid_name",
                bad.desc_id
            )));
        }
        self.load_gt_video = true;
        Ok(self)
    }

    pub fn loads_ground_truth_video(&self) -> bool {
        self.load_gt_video
    }

    pub fn example(&self, index: usize) -> Result<Example> {
        let queries = &self.shared.queries;
        let record  = queries.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: queries.len(),
        })?;

        let meta = QueryMeta {
            desc_id:  record.desc_id,
            desc:     record.desc.clone(),
            vid_name: if self.load_gt_video { record.vid_name.clone() } else { None },
            duration: None,
            ts:       None,
        };

        Ok(Example::new(ExampleMeta::Query(meta))
            .with_feature(FeatureKey::Query, self.shared.extractor.query_feature(record.desc_id)?))
    }
}

// ─── ContextEvalDataset ───────────────────────────────────────────────────────
/// One item per distinct video of the split.
#[derive(Debug, Clone)]
pub struct ContextEvalDataset {
    shared: Arc<EvalShared>,
}

impl ContextEvalDataset {
    pub fn example(&self, index: usize) -> Result<Example> {
        let videos = &self.shared.videos;
        let video  = videos.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: videos.len(),
        })?;
        let extractor = &self.shared.extractor;

        let meta = VideoMeta { vid_name: video.vid_name.clone(), duration: video.duration };

        Ok(Example::new(ExampleMeta::Video(meta))
            .with_feature(FeatureKey::Video, extractor.video_feature(&video.vid_name)?)
            .with_feature(FeatureKey::Sub, extractor.sub_feature(&video.vid_name)?))
    }
}

// ─── EvalView ─────────────────────────────────────────────────────────────────
/// Either view, for callers that choose the mode at runtime.
#[derive(Debug, Clone)]
pub enum EvalView {
    Query(QueryEvalDataset),
    Context(ContextEvalDataset),
}

impl EvalView {
    pub fn mode(&self) -> EvalMode {
        match self {
            EvalView::Query(_)   => EvalMode::Query,
            EvalView::Context(_) => EvalMode::Context,
        }
    }

    pub fn example(&self, index: usize) -> Result<Example> {
        match self {
            EvalView::Query(q)   => q.example(index),
            EvalView::Context(c) => c.example(index),
        }
    }
}

// ─── Burn Dataset Implementations ─────────────────────────────────────────────
// A store error while building an item panics: the stores are
// assumed complete for the run, so it is a setup error.
impl Dataset<Example> for QueryEvalDataset {
    fn get(&self, index: usize) -> Option<Example> {
        if index >= self.len() {
            return None;
        }
        match self.example(index) {
            Ok(example) => Some(example),
            Err(e) => panic!("cannot build query eval example {index}: {e}"),
        }
    }

    fn len(&self) -> usize {
        self.shared.queries.len()
    }
}

impl Dataset<Example> for ContextEvalDataset {
    fn get(&self, index: usize) -> Option<Example> {
        if index >= self.len() {
            return None;
        }
        match self.example(index) {
            Ok(example) => Some(example),
            Err(e) => panic!("cannot build context eval example {index}: {e}"),
        }
    }

    fn len(&self) -> usize {
        self.shared.videos.len()
    }
}

impl Dataset<Example> for EvalView {
    fn get(&self, index: usize) -> Option<Example> {
        match self {
            EvalView::Query(q)   => q.get(index),
            EvalView::Context(c) => c.get(index),
        }
    }

    fn len(&self) -> usize {
        match self {
            EvalView::Query(q)   => q.len(),
            EvalView::Context(c) => c.len(),
        }
    }
}
