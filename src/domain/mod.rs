// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// data layer works with:
//
//   record.rs   - one query line from the annotation file,
//                 and one video entry from the video index
//   feature.rs  - host-side feature arrays and the per-modality
//                 feature slot (sequence / pooled / absent)
//   example.rs  - one dataset item: metadata plus features
//   traits.rs   - the seams other layers implement
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Query records and video index entries
pub mod record;

// Feature arrays and modality keys
pub mod feature;

// Dataset items handed to the batcher
pub mod example;

// Abstractions implemented by the infra and data layers
pub mod traits;
