// ============================================================
// Layer 2: EvalPass
// ============================================================
// Runs an evaluation split through both views:
//
//   Step 1: Build RetrievalEvalData from the query file, the
//           video index and the stores      (Layer 4 / 6)
//   Step 2: Query view   → DataLoader pass  (padded queries)
//   Step 3: Context view → DataLoader pass  (pooled videos)
//
// A ranking stage scores every query against every video, so the
// summary also reports num_queries x num_videos.
//
// Reference: Burn Book §4 (DataLoader)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::application::pass::{drive, BackendKind, LoaderConfig, PassStats, StorePaths};
use crate::config::EvalConfig;
use crate::data::eval_dataset::RetrievalEvalData;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalPassConfig {
    pub eval:             EvalConfig,
    pub data_path:        PathBuf,
    pub video_index_path: PathBuf,
    pub stores:           StorePaths,
    pub loader:           LoaderConfig,
    pub backend:          BackendKind,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct EvalPassSummary {
    pub dset_name:   String,
    pub split:       String,
    pub backend:     BackendKind,
    pub num_queries: usize,
    pub num_videos:  usize,
    pub query:       PassStats,
    pub context:     PassStats,
}

impl EvalPassSummary {
    /// Query x context pairs the ranking stage would score.
    pub fn ranking_pairs(&self) -> usize {
        self.num_queries * self.num_videos
    }
}

// ─── EvalPass ─────────────────────────────────────────────────────────────────
pub struct EvalPass {
    config: EvalPassConfig,
}

impl EvalPass {
    pub fn new(config: EvalPassConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalPassSummary> {
        let cfg = &self.config;

        // ── Step 1: Shared evaluation data ───────────────────────────────────
        let data = RetrievalEvalData::from_files(
            &cfg.eval,
            &cfg.data_path,
            &cfg.video_index_path,
            &cfg.stores.to_stores(),
        )
        .with_context(|| format!("building evaluation data for split '{}'", cfg.eval.eval_split_name))?;

        // ── Step 2 + 3: One pass per view ────────────────────────────────────
        let (query, context) = match cfg.backend {
            BackendKind::NdArray => {
                let device = burn::backend::ndarray::NdArrayDevice::Cpu;
                self.run_views::<burn::backend::NdArray>(&data, &device)?
            }
            BackendKind::Wgpu => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.run_views::<burn::backend::Wgpu>(&data, &device)?
            }
        };

        Ok(EvalPassSummary {
            dset_name:   data.dset_name().to_string(),
            split:       data.split().to_string(),
            backend:     cfg.backend,
            num_queries: data.num_queries(),
            num_videos:  data.num_videos(),
            query,
            context,
        })
    }

    fn run_views<B: Backend>(
        &self,
        data:   &RetrievalEvalData,
        device: &B::Device,
    ) -> Result<(PassStats, PassStats)> {
        let loader = &self.config.loader;

        let mut queries = data.query_view();
        if self.config.eval.load_gt_video {
            queries = queries.with_ground_truth_video()?;
        }
        let query   = drive::<B, _>(queries, loader, device, "eval/query");
        let context = drive::<B, _>(data.context_view(), loader, device, "eval/context");
        Ok((query, context))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextMode, DatasetConfig};
    use crate::infra::feature_store::StoreDriver;
    use crate::testing::write_store;

    #[test]
    fn test_eval_pass_runs_both_views() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("val.jsonl");
        std::fs::write(
            &data_path,
            "{\"desc_id\": 0, \"desc\": \"a\"}\n{\"desc_id\": 1, \"desc\": \"b\"}\n{\"desc_id\": 2, \"desc\": \"c\"}\n",
        )
        .unwrap();
        let video_index_path = dir.path().join("video_index.json");
        std::fs::write(&video_index_path, r#"{"val": {"x": [5.0, 0], "y": [6.0, 1]}}"#).unwrap();

        let q = write_store(
            dir.path(),
            "q.safetensors",
            &[("0", vec![vec![0.5; 4]; 2]), ("1", vec![vec![0.5; 4]; 3]), ("2", vec![vec![0.5; 4]; 1])],
        );
        let s = write_store(dir.path(), "s.safetensors", &[("x", vec![vec![1.0; 2]; 3]), ("y", vec![vec![1.0; 2]; 1])]);

        let cfg = EvalPassConfig {
            eval: EvalConfig {
                dataset: DatasetConfig {
                    dset_name:       "tvr".into(),
                    ctx_mode:        "sub".parse::<ContextMode>().unwrap(),
                    max_desc_len:    8,
                    max_ctx_len:     8,
                    normalize_vfeat: false,
                    normalize_tfeat: true,
                    data_ratio:      1.0,
                },
                eval_split_name: "val".into(),
                load_gt_video:   false,
            },
            data_path,
            video_index_path,
            stores: StorePaths {
                query:  q.to_string_lossy().into_owned(),
                video:  None,
                sub:    Some(s.to_string_lossy().into_owned()),
                driver: StoreDriver::Core,
            },
            loader:  LoaderConfig { batch_size: 2, ..LoaderConfig::default() },
            backend: BackendKind::NdArray,
        };

        let summary = EvalPass::new(cfg).execute().unwrap();
        assert_eq!(summary.dset_name, "tvr");
        assert_eq!(summary.query.examples, 3);
        assert_eq!(summary.context.examples, 2);
        assert_eq!(summary.ranking_pairs(), 6);

        assert!(summary.query.inputs.contains_key("query_mask"));
        assert!(!summary.context.inputs.contains_key("query_feat"));
        assert_eq!(summary.context.inputs["sub_feat"], Some(vec![2, 2]));
        assert_eq!(summary.context.inputs["video_feat"], None);
    }
}
