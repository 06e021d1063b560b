// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Access to the on-disk resources the datasets read from:
//
//   feature_store.rs - safetensors-backed keyed array stores
//                      (query / video / subtitle embeddings),
//                      the explicit StoreSource handle type and
//                      an in-memory store for synthetic data
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling)

/// Keyed embedding stores
pub mod feature_store;
