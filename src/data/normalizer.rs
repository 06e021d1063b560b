// ============================================================
// Layer 4: Feature Normalizer
// ============================================================
// Row-wise L2 normalisation plus the pooling helper used for
// video and subtitle features.
//
//   l2_normalize:  x_i / (||x_i|| + EPS)   for every row i
//   mean_pool:     (1/n) * sum_i x_i       over the rows
//
// EPS keeps an all-zero row at exactly zero instead of turning
// it into NaN. A row that is already unit length comes back
// within ~1e-5 of itself.
//
// Reference: ndarray documentation (mean_axis, rows_mut)

use ndarray::{Array1, ArrayViewMut1, Axis};

use crate::domain::feature::FeatureArray;
use crate::error::{DataError, Result};

/// Added to every norm before dividing.
pub const EPS: f32 = 1e-5;

/// L2-normalise a single vector in place.
pub fn l2_normalize(mut values: ArrayViewMut1<'_, f32>) {
    let norm = values.dot(&values).sqrt();
    values /= norm + EPS;
}

/// L2-normalise every row of `array` along its last axis.
pub fn l2_normalize_rows(array: &mut FeatureArray) {
    for row in array.view_mut().rows_mut() {
        l2_normalize(row);
    }
}

/// Average the rows of `array` into one `[dim]` vector.
///
/// `store` and `key` only label the error when the array is empty.
pub fn mean_pool(array: &FeatureArray, store: &str, key: &str) -> Result<Array1<f32>> {
    array.view().mean_axis(Axis(0)).ok_or_else(|| DataError::EmptyFeature {
        store: store.to_string(),
        key:   key.to_string(),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayView1};

    fn norm(v: ArrayView1<'_, f32>) -> f32 {
        v.dot(&v).sqrt()
    }

    #[test]
    fn test_rows_become_unit_length() {
        let mut a = FeatureArray::from_rows(&[vec![3.0, 4.0], vec![0.0, 2.0]]).unwrap();
        l2_normalize_rows(&mut a);
        for row in a.view().rows() {
            assert!((norm(row) - 1.0).abs() < 1e-4);
        }
        let first = a.row(0).unwrap();
        assert!((first[0] - 0.6).abs() < 1e-4);
        assert!((first[1] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_normalising_twice_is_stable() {
        let mut v = array![1.0_f32, -2.0, 2.0];
        l2_normalize(v.view_mut());
        let once = v.clone();
        l2_normalize(v.view_mut());
        for (a, b) in once.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_row_stays_finite() {
        let mut a = FeatureArray::from_rows(&[vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]).unwrap();
        l2_normalize_rows(&mut a);
        assert!(a.view().iter().all(|v| v.is_finite()));
        assert_eq!(a.row(0).unwrap(), array![0.0_f32, 0.0, 0.0]);
    }

    #[test]
    fn test_mean_pool_collapses_rows() {
        let a = FeatureArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        assert_eq!(mean_pool(&a, "s", "k").unwrap(), array![2.0_f32, 4.0]);

        // Output length tracks dim, not the number of rows
        let long = FeatureArray::new(vec![1.0; 50 * 2], 50, 2).unwrap();
        assert_eq!(mean_pool(&long, "s", "k").unwrap().len(), 2);
    }

    #[test]
    fn test_mean_pool_rejects_empty() {
        let a = FeatureArray::new(Vec::new(), 0, 4).unwrap();
        assert!(matches!(mean_pool(&a, "s", "k"), Err(DataError::EmptyFeature { .. })));
    }
}
