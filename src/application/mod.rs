// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// This layer wires the data layer together for one purpose:
// iterating a split end to end, the way a training or ranking
// loop would, and reporting what it saw.
//
// Rules for this layer:
//   - No model code here
//   - No printing here (that's Layer 1)
//   - No direct file parsing (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Shared settings and the DataLoader driver
pub mod pass;

// One pass over the training split
pub mod train_pass;

// Query view + context view pass over an evaluation split
pub mod eval_pass;
