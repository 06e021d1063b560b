// ============================================================
// moment-retrieval-data
// ============================================================
// Data layer for video moment retrieval: precomputed query,
// video and subtitle embeddings are read from keyed feature
// stores and assembled into Burn datasets and tensor batches.
//
//   Layer 1  cli          - clap front end (moment-data binary)
//   Layer 2  application  - train / eval DataLoader passes
//   Layer 3  domain       - records, features, examples, traits
//   Layer 4  data         - datasets, batcher, device mover
//   Layer 6  infra        - safetensors feature stores
//
// Shared by all layers: config (DatasetConfig, EvalConfig) and
// error (DataError).

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;

#[cfg(test)]
mod testing;

pub use config::{ContextMode, DatasetConfig, EvalConfig, EvalMode};
pub use data::batcher::{collate, BatchFeature, RetrievalBatch, RetrievalBatcher};
pub use data::dataset::RetrievalDataset;
pub use data::device::{prepare_batch_inputs, ModelInput, Transfer};
pub use data::eval_dataset::{ContextEvalDataset, EvalView, QueryEvalDataset, RetrievalEvalData};
pub use data::features::FeatureStores;
pub use domain::example::{Example, ExampleMeta};
pub use domain::feature::{Feature, FeatureArray, FeatureKey};
pub use error::{DataError, Result};
pub use infra::feature_store::{FeatureStore, InMemoryStore, StoreDriver, StoreSource};
