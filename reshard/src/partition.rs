//! Generic column-parallel and row-parallel weight sharding.
//!
//! These two splits are the building blocks every architecture-specific rule
//! composes: column-parallel slices the output-feature axis (axis 0 of a
//! stored `[out, in]` weight), row-parallel slices the input-feature axis
//! (axis 1). A row-parallel bias is never split: partial outputs are summed
//! across ranks downstream, so the full bias must be added exactly once,
//! after that reduction.

use crate::shard::ShardConfig;
use crate::tensor::{HostTensor, TensorMap};
use crate::weights::{SliceView, WeightSource};
use crate::{Error, Result};

/// Read this rank's contiguous block of `axis` from a slice view.
///
/// # Errors
/// Returns an error if `axis` is out of range or the read fails.
pub fn shard_axis(slice: &dyn SliceView, axis: usize, shard: &ShardConfig) -> Result<HostTensor> {
    let extent = *slice.shape().get(axis).ok_or_else(|| {
        Error::InvalidShape(format!(
            "axis {axis} out of range for shape {:?}",
            slice.shape()
        ))
    })?;
    let p = shard.partition(extent);
    slice.read_range(axis, p.start, p.end)
}

/// Shard `{prefix}weight` (and `{prefix}bias` when `has_bias`) along the
/// output-feature axis. Each rank keeps its own block of output features, so
/// the bias splits the same way the weight does.
///
/// `prefix` includes its trailing dot, e.g. `transformer.h.0.attn.c_attn.`.
///
/// # Errors
/// Returns `WeightNotFound` if a required tensor is absent.
pub fn column_parallel_weights(
    source: &impl WeightSource,
    prefix: &str,
    has_bias: bool,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let mut out = TensorMap::new();

    let name = format!("{prefix}weight");
    let weight = source.open_slice(&name)?;
    out.insert(name, shard_axis(weight.as_ref(), 0, shard)?);

    if has_bias {
        let name = format!("{prefix}bias");
        let bias = source.open_slice(&name)?;
        out.insert(name, shard_axis(bias.as_ref(), 0, shard)?);
    }

    Ok(out)
}

/// Shard `{prefix}weight` along the input-feature axis; `{prefix}bias`, when
/// present, is read in full and replicated on every rank.
///
/// # Errors
/// Returns `WeightNotFound` if a required tensor is absent.
pub fn row_parallel_weights(
    source: &impl WeightSource,
    prefix: &str,
    has_bias: bool,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let mut out = TensorMap::new();

    let name = format!("{prefix}weight");
    let weight = source.open_slice(&name)?;
    out.insert(name, shard_axis(weight.as_ref(), 1, shard)?);

    if has_bias {
        let name = format!("{prefix}bias");
        let bias = source.load(&name)?;
        out.insert(name, bias);
    }

    Ok(out)
}
