// ============================================================
// Layer 4: Device Mover
// ============================================================
// Moves the tensors of a collated batch to the model's device
// and flattens them into the name -> input map the model reads:
//
//   query_feat  Padded { feat, mask }  -> "query_feat" (feat)
//                                         "query_mask" (mask)
//   video_feat  Stacked                -> "video_feat"
//   sub_feat    Absent                 -> "sub_feat" (Absent)
//
// Only the feature map is consumed; metadata stays with the
// caller untouched.
//
// Reference: Burn Book §3 (Backend, Device)

use std::collections::BTreeMap;

use burn::prelude::*;

use crate::data::batcher::BatchFeature;
use crate::domain::feature::{mask_key, FeatureKey};

/// How a transfer waits for the destination device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transfer {
    /// Enqueue the copies and return
    #[default]
    NonBlocking,
    /// Synchronise the destination device before returning
    Blocking,
}

/// One named model input after the move.
#[derive(Debug, Clone)]
pub enum ModelInput<B: Backend> {
    /// `[batch, max_len, dim]`
    Sequence(Tensor<B, 3>),
    /// `[batch, max_len]`, true on real rows
    Mask(Tensor<B, 2, Bool>),
    /// `[batch, dim]`
    Pooled(Tensor<B, 2>),
    Absent,
}

impl<B: Backend> ModelInput<B> {
    pub fn is_absent(&self) -> bool {
        matches!(self, ModelInput::Absent)
    }

    /// Tensor dims, None when absent.
    pub fn dims(&self) -> Option<Vec<usize>> {
        match self {
            ModelInput::Sequence(t) => Some(t.dims().to_vec()),
            ModelInput::Mask(t)     => Some(t.dims().to_vec()),
            ModelInput::Pooled(t)   => Some(t.dims().to_vec()),
            ModelInput::Absent      => None,
        }
    }
}

/// Move every feature to `device`, registering each padded feature's
/// mask under its derived key (`query_feat` -> `query_mask`).
pub fn prepare_batch_inputs<B: Backend>(
    features: BTreeMap<FeatureKey, BatchFeature<B>>,
    device:   &B::Device,
    transfer: Transfer,
) -> BTreeMap<String, ModelInput<B>> {
    let mut inputs = BTreeMap::new();

    for (key, feature) in features {
        let name = key.name();
        match feature {
            BatchFeature::Padded { feat, mask, .. } => {
                inputs.insert(name.to_string(), ModelInput::Sequence(feat.to_device(device)));
                inputs.insert(mask_key(name), ModelInput::Mask(mask.to_device(device)));
            }
            BatchFeature::Stacked(t) => {
                inputs.insert(name.to_string(), ModelInput::Pooled(t.to_device(device)));
            }
            BatchFeature::Absent => {
                inputs.insert(name.to_string(), ModelInput::Absent);
            }
        }
    }

    if transfer == Transfer::Blocking {
        B::sync(device);
    }

    tracing::debug!("Prepared {} model inputs ({:?})", inputs.len(), transfer);
    inputs
}
