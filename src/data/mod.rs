// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// This layer turns annotation records and precomputed feature
// stores into device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   records (.jsonl) + video index (.json)
//       │
//       ▼
//   loader / splitter   → parse records, keep the data_ratio prefix
//       │
//       ▼
//   FeatureExtractor    → store lookups, truncation, pooling, L2 norm
//       │
//       ▼
//   RetrievalDataset    → training examples (Burn Dataset)
//   RetrievalEvalData   → query view / context view (Burn Dataset)
//       │
//       ▼
//   RetrievalBatcher    → pads and stacks examples into a batch
//       │
//       ▼
//   prepare_batch_inputs → moves tensors to the device, adds masks
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads JSON-lines records and the per-split video index
pub mod loader;

/// Keeps the leading data_ratio fraction of a record list
pub mod splitter;

/// L2 normalisation and mean pooling
pub mod normalizer;

/// Per-modality feature lookup shared by all datasets
pub mod features;

/// Implements Burn's Dataset trait for training examples
pub mod dataset;

/// Query and context evaluation views
pub mod eval_dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Moves batch tensors to the model device
pub mod device;
