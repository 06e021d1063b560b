// ============================================================
// Layer 4: Data Ratio Splitter
// ============================================================
// Keeps only the leading fraction of a record list:
//
//   n_keep = floor(len * ratio)
//
// It is a deterministic prefix, never a random sample, so two
// runs with the same ratio always see the same records in the
// same order. Used to train or evaluate on a subset quickly.
//
// Reference: Rust Book §8 (Vectors)

use crate::error::{DataError, Result};

/// Truncate `items` to its first `floor(len * ratio)` elements.
///
/// `ratio` must lie in (0, 1]; 1.0 keeps everything.
pub fn take_fraction<T>(mut items: Vec<T>, ratio: f64) -> Result<Vec<T>> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(DataError::config(format!(
            "data_ratio must be in (0, 1], got {ratio}"
        )));
    }
    if ratio == 1.0 {
        return Ok(items);
    }

    let total  = items.len();
    let n_keep = ((total as f64) * ratio).floor() as usize;
    items.truncate(n_keep);

    tracing::info!(
        "Using {:.1}% of the data: {} of {} examples",
        ratio * 100.0,
        n_keep,
        total
    );
    Ok(items)
}
