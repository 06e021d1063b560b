// ============================================================
// Layer 2: Pass Driver
// ============================================================
// Shared pieces of the train and eval passes:
//
//   StorePaths   - where the three feature stores live
//   LoaderConfig - batch size, shuffling, workers, transfer mode
//   BackendKind  - which Burn backend the tensors are built on
//   drive()      - DataLoader iteration: batch → device → stats
//
// Reference: Burn Book §4 (DataLoader)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::RetrievalBatcher;
use crate::data::device::{prepare_batch_inputs, Transfer};
use crate::data::features::FeatureStores;
use crate::domain::example::Example;
use crate::infra::feature_store::{StoreDriver, StoreSource};

// ─── BackendKind ──────────────────────────────────────────────────────────────
/// Burn backend the batches are materialised on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// CPU (burn-ndarray)
    #[default]
    NdArray,
    /// GPU through wgpu
    Wgpu,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ndarray" | "cpu" => Ok(BackendKind::NdArray),
            "wgpu" | "gpu"    => Ok(BackendKind::Wgpu),
            other             => Err(format!("unknown backend '{other}' (expected 'ndarray' or 'wgpu')")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::NdArray => f.write_str("ndarray"),
            BackendKind::Wgpu    => f.write_str("wgpu"),
        }
    }
}

// ─── StorePaths ───────────────────────────────────────────────────────────────
/// Feature store files for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePaths {
    pub query:  String,
    pub video:  Option<String>,
    pub sub:    Option<String>,
    pub driver: StoreDriver,
}

impl StorePaths {
    /// Store references to be opened by the dataset that needs them.
    pub fn to_stores(&self) -> FeatureStores {
        let mut stores = FeatureStores::new(StoreSource::open(&self.query, self.driver));
        if let Some(video) = &self.video {
            stores = stores.with_video(StoreSource::open(video, self.driver));
        }
        if let Some(sub) = &self.sub {
            stores = stores.with_sub(StoreSource::open(sub, self.driver));
        }
        stores
    }
}

// ─── LoaderConfig ─────────────────────────────────────────────────────────────
/// How the DataLoader walks a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub batch_size:   usize,
    /// Shuffle with this seed; None keeps dataset order
    pub shuffle_seed: Option<u64>,
    /// 0 iterates on the calling thread
    pub num_workers:  usize,
    /// Synchronise the device after every transfer
    pub blocking:     bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size:   32,
            shuffle_seed: None,
            num_workers:  0,
            blocking:     false,
        }
    }
}

impl LoaderConfig {
    fn transfer(&self) -> Transfer {
        if self.blocking { Transfer::Blocking } else { Transfer::NonBlocking }
    }
}

// ─── PassStats ────────────────────────────────────────────────────────────────
/// What one loader pass produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassStats {
    pub batches:  usize,
    pub examples: usize,
    /// Dims of each model input in the last batch (None = absent)
    pub inputs:   BTreeMap<String, Option<Vec<usize>>>,
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} examples in {} batches", self.examples, self.batches)?;
        for (name, dims) in &self.inputs {
            match dims {
                Some(d) => write!(f, "\n    {name:<12} {d:?}")?,
                None    => write!(f, "\n    {name:<12} absent")?,
            }
        }
        Ok(())
    }
}

// ─── drive ────────────────────────────────────────────────────────────────────
/// Iterate `dataset` through a Burn DataLoader, moving every batch to
/// `device` the way a training step would.
pub fn drive<B, D>(dataset: D, loader: &LoaderConfig, device: &B::Device, label: &str) -> PassStats
where
    B: Backend,
    D: Dataset<Example> + 'static,
{
    let batcher = RetrievalBatcher::<B>::new(device.clone());
    let mut builder = DataLoaderBuilder::new(batcher).batch_size(loader.batch_size);
    if let Some(seed) = loader.shuffle_seed {
        builder = builder.shuffle(seed);
    }
    if loader.num_workers > 0 {
        builder = builder.num_workers(loader.num_workers);
    }
    let dataloader = builder.build(dataset);

    let mut stats = PassStats::default();
    for batch in dataloader.iter() {
        let n = batch.len();
        let inputs = prepare_batch_inputs(batch.features, device, loader.transfer());

        stats.batches  += 1;
        stats.examples += n;
        stats.inputs = inputs
            .iter()
            .map(|(name, input)| (name.clone(), input.dims()))
            .collect();

        tracing::debug!("{label}: batch {} with {n} examples", stats.batches);
    }

    tracing::info!("{label}: {}", stats.to_string().replace('\n', " "));
    stats
}
