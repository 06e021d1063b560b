// ============================================================
// Layer 2: TrainPass
// ============================================================
// Runs the training split through the full data path once:
//
//   Step 1: Resolve the dataset config  (flags or a saved JSON)
//   Step 2: Load the annotation records (Layer 4 - data)
//   Step 3: Build the training dataset  (Layer 4 / 6)
//   Step 4: Drive it through Burn's DataLoader on the chosen
//           backend, moving each batch to the device
//
// Reference: Burn Book §4 (DataLoader)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::pass::{drive, BackendKind, LoaderConfig, PassStats, StorePaths};
use crate::config::DatasetConfig;
use crate::data::dataset::RetrievalDataset;
use crate::data::loader::JsonlRecordLoader;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainPassConfig {
    pub dataset:        DatasetConfig,
    /// Saved DatasetConfig that replaces `dataset` when given
    pub dataset_config: Option<PathBuf>,
    /// Where to write the effective DatasetConfig after the pass
    pub save_config:    Option<PathBuf>,
    pub train_path:     PathBuf,
    pub stores:         StorePaths,
    pub loader:         LoaderConfig,
    pub backend:        BackendKind,
}

/// Result of one training pass.
#[derive(Debug, Clone, Serialize)]
pub struct TrainPassSummary {
    pub dset_name: String,
    pub backend:   BackendKind,
    pub records:   usize,
    pub stats:     PassStats,
}

// ─── TrainPass ────────────────────────────────────────────────────────────────
pub struct TrainPass {
    config: TrainPassConfig,
}

impl TrainPass {
    pub fn new(config: TrainPassConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainPassSummary> {
        let cfg = &self.config;

        // ── Step 1: Dataset config ───────────────────────────────────────────
        let dataset_cfg = match &cfg.dataset_config {
            Some(path) => DatasetConfig::load_json(path)
                .with_context(|| format!("loading dataset config {}", path.display()))?,
            None => cfg.dataset.clone(),
        };

        // ── Step 2 + 3: Records and dataset ──────────────────────────────────
        tracing::info!("Loading training records from '{}'", cfg.train_path.display());
        let loader  = JsonlRecordLoader::new(&cfg.train_path);
        let dataset = RetrievalDataset::from_source(&dataset_cfg, &loader, &cfg.stores.to_stores())
            .context("building training dataset")?;
        let records   = dataset.records().len();
        let dset_name = dataset.dset_name().to_string();

        // ── Step 4: Loader pass ──────────────────────────────────────────────
        tracing::info!("Running training pass on the {} backend", cfg.backend);
        let stats = match cfg.backend {
            BackendKind::NdArray => {
                let device = burn::backend::ndarray::NdArrayDevice::Cpu;
                drive::<burn::backend::NdArray, _>(dataset, &cfg.loader, &device, "train")
            }
            BackendKind::Wgpu => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                drive::<burn::backend::Wgpu, _>(dataset, &cfg.loader, &device, "train")
            }
        };

        if let Some(path) = &cfg.save_config {
            dataset_cfg
                .save_json(path)
                .with_context(|| format!("saving dataset config {}", path.display()))?;
        }

        Ok(TrainPassSummary {
            dset_name,
            backend: cfg.backend,
            records,
            stats,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextMode;
    use crate::infra::feature_store::StoreDriver;
    use crate::testing::write_store;

    fn pass_config(dir: &std::path::Path) -> TrainPassConfig {
        let train_path = dir.join("train.jsonl");
        let lines: String = (0..5)
            .map(|i| {
                format!(
                    "{{\"desc_id\": {i}, \"desc\": \"q{i}\", \"vid_name\": \"v{}\", \"duration\": 9.0, \"ts\": [1.0, 2.0]}}\n",
                    i % 2
                )
            })
            .collect();
        std::fs::write(&train_path, lines).unwrap();

        let q = write_store(
            dir,
            "q.safetensors",
            &[
                ("0", vec![vec![1.0; 3]; 2]),
                ("1", vec![vec![1.0; 3]; 4]),
                ("2", vec![vec![1.0; 3]; 1]),
                ("3", vec![vec![1.0; 3]; 6]),
                ("4", vec![vec![1.0; 3]; 3]),
            ],
        );
        let v = write_store(dir, "v.safetensors", &[("v0", vec![vec![2.0; 5]; 4]), ("v1", vec![vec![3.0; 5]; 2])]);

        TrainPassConfig {
            dataset: DatasetConfig {
                dset_name:       "tvr".into(),
                ctx_mode:        ContextMode::video_only(),
                max_desc_len:    5,
                max_ctx_len:     10,
                normalize_vfeat: true,
                normalize_tfeat: false,
                data_ratio:      1.0,
            },
            dataset_config: None,
            save_config:    Some(dir.join("dataset.json")),
            train_path,
            stores: StorePaths {
                query:  q.to_string_lossy().into_owned(),
                video:  Some(v.to_string_lossy().into_owned()),
                sub:    None,
                driver: StoreDriver::Direct,
            },
            loader: LoaderConfig { batch_size: 2, ..LoaderConfig::default() },
            backend: BackendKind::NdArray,
        }
    }

    #[test]
    fn test_train_pass_covers_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let summary = TrainPass::new(pass_config(dir.path())).execute().unwrap();

        assert_eq!(summary.dset_name, "tvr");
        assert_eq!(summary.records, 5);
        assert_eq!(summary.stats.examples, 5);
        assert_eq!(summary.stats.batches, 3);
        assert!(summary.stats.inputs.contains_key("query_mask"));
        assert_eq!(summary.stats.inputs["sub_feat"], None);
        assert_eq!(summary.stats.inputs["video_feat"], Some(vec![1, 5]));

        let saved = DatasetConfig::load_json(dir.path().join("dataset.json")).unwrap();
        assert_eq!(saved.ctx_mode, ContextMode::video_only());
    }

    #[test]
    fn test_missing_store_is_reported_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = pass_config(dir.path());
        cfg.stores.video = Some(dir.path().join("nope.safetensors").to_string_lossy().into_owned());

        let err = TrainPass::new(cfg).execute().unwrap_err();
        assert!(format!("{err:#}").contains("building training dataset"));
    }
}
