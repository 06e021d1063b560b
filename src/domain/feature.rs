// ============================================================
// Layer 3: Feature Domain Types
// ============================================================
// FeatureArray is a host-side `ndarray::Array2<f32>`:
//
//   axis 0 = sequence length (tokens or clips)
//   axis 1 = embedding size
//
// Feature is what a single modality contributes to an example:
//
//   Sequence(FeatureArray) - variable-length query tokens
//   Pooled(Vec<f32>)       - one averaged vector per video
//   Absent                 - modality switched off for this run
//
// Absent is an explicit variant so nothing downstream has to
// infer "switched off" from a tensor shape.

use std::fmt;

use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// `[rows, dim]` array of f32 values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureArray {
    data: Array2<f32>,
}

impl FeatureArray {
    /// Wrap a row-major buffer, checking that it holds exactly `rows * dim` values.
    pub fn new(data: Vec<f32>, rows: usize, dim: usize) -> Result<Self> {
        let found = data.len();
        Array2::from_shape_vec((rows, dim), data)
            .map(Self::from)
            .map_err(|_| DataError::ShapeMismatch {
                key:      "feature array".to_string(),
                expected: vec![rows, dim],
                found:    vec![found],
            })
    }

    /// Build from nested rows; every row must have the same width.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(DataError::ShapeMismatch {
                key:      "feature array".to_string(),
                expected: vec![dim],
                found:    vec![bad.len()],
            });
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(data, rows.len(), dim)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows(), self.dim()]
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.data.view_mut()
    }

    /// The `i`-th row, or None past the end.
    pub fn row(&self, i: usize) -> Option<ArrayView1<'_, f32>> {
        (i < self.rows()).then(|| self.data.row(i))
    }

    /// Keep at most the first `max_rows` rows.
    pub fn truncate_rows(&mut self, max_rows: usize) {
        if self.rows() > max_rows {
            self.data = self.data.slice(s![..max_rows, ..]).to_owned();
        }
    }
}

impl From<Array2<f32>> for FeatureArray {
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

/// The modality slots an example can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureKey {
    Query,
    Video,
    Sub,
}

impl FeatureKey {
    /// Name the model looks the tensor up by.
    pub fn name(self) -> &'static str {
        match self {
            FeatureKey::Query => "query_feat",
            FeatureKey::Video => "video_feat",
            FeatureKey::Sub   => "sub_feat",
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name under which the validity mask of a padded feature is registered:
/// `"query_feat"` becomes `"query_mask"`.
pub fn mask_key(feature_name: &str) -> String {
    feature_name.replace("feat", "mask")
}

/// What one modality contributes to an example.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    /// Variable-length `[len, dim]` sequence
    Sequence(FeatureArray),
    /// Fixed-size `[dim]` vector (mean over clips)
    Pooled(Vec<f32>),
    /// Modality disabled for this run
    Absent,
}

impl Feature {
    /// Shape of the feature, None when absent.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            Feature::Sequence(a) => Some(a.shape().to_vec()),
            Feature::Pooled(v)   => Some(vec![v.len()]),
            Feature::Absent      => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Feature::Absent)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(FeatureArray::new(vec![0.0; 5], 2, 3).is_err());
        assert!(FeatureArray::new(vec![0.0; 6], 2, 3).is_ok());
    }

    #[test]
    fn test_new_rejects_overflowing_shape() {
        let err = FeatureArray::new(vec![0.0; 4], usize::MAX, 2).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_truncate_keeps_leading_rows() {
        let mut a = FeatureArray::from_rows(&[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]).unwrap();
        a.truncate_rows(2);
        assert_eq!(a.shape(), [2, 2]);
        assert_eq!(a.row(1).unwrap(), array![2.0_f32, 2.0]);
        assert!(a.row(2).is_none());

        // Truncating to more rows than exist is a no-op
        a.truncate_rows(10);
        assert_eq!(a.rows(), 2);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        assert!(FeatureArray::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_from_array_keeps_layout() {
        let a = FeatureArray::from(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(a.shape(), [2, 3]);
        assert_eq!(a, FeatureArray::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap());
    }

    #[test]
    fn test_mask_key_derivation() {
        assert_eq!(mask_key(FeatureKey::Query.name()), "query_mask");
        assert_eq!(mask_key("sub_feat"), "sub_mask");
    }

    #[test]
    fn test_feature_shapes() {
        assert_eq!(Feature::Pooled(vec![0.0; 4]).shape(), Some(vec![4]));
        assert_eq!(Feature::Absent.shape(), None);
        let seq = Feature::Sequence(FeatureArray::new(vec![0.0; 6], 3, 2).unwrap());
        assert_eq!(seq.shape(), Some(vec![3, 2]));
    }
}
