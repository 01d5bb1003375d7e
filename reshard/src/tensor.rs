//! Host-side tensor buffers produced by resharding.
//!
//! [`HostTensor`] holds raw row-major bytes on the CPU. Sharding never
//! interprets element values (slicing is pure byte-range arithmetic), so one
//! buffer type covers every supported dtype; [`HostTensor::as_f32_slice`] and
//! [`HostTensor::to_f32_vec`] exist for callers and tests that do look at
//! values.

use std::collections::BTreeMap;

use crate::dtype::{DType, TensorDType};
use crate::{Error, Result};

/// One rank's sharded parameters, keyed by checkpoint tensor name.
///
/// A `BTreeMap` so iteration order is deterministic across runs and ranks.
pub type TensorMap = BTreeMap<String, HostTensor>;

/// Raw tensor data on the host.
///
/// The `data` field holds the raw bytes in the tensor's `dtype` encoding,
/// row-major. For f32 tensors this is `numel * 4` bytes of little-endian f32.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    shape: Vec<usize>,
    dtype: DType,
    data: Vec<u8>,
}

impl HostTensor {
    /// Create a tensor from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidShape` if `data.len()` does not match
    /// `numel * dtype.size_in_bytes()`.
    pub fn from_raw(shape: Vec<usize>, dtype: DType, data: Vec<u8>) -> Result<Self> {
        let expected = shape.iter().product::<usize>() * dtype.size_in_bytes();
        if data.len() != expected {
            return Err(Error::InvalidShape(format!(
                "shape {shape:?} ({dtype}) requires {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, dtype, data })
    }

    /// Create a tensor from a typed slice of values.
    ///
    /// # Panics
    /// Panics if `values.len()` does not match the shape.
    #[must_use]
    pub fn from_slice<T: TensorDType>(shape: &[usize], values: &[T]) -> Self {
        assert_eq!(
            values.len(),
            shape.iter().product::<usize>(),
            "from_slice: {} values do not fill shape {shape:?}",
            values.len()
        );
        Self {
            shape: shape.to_vec(),
            dtype: T::DTYPE,
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }

    /// Create an all-zero tensor. Every byte is an exact zero, which encodes
    /// numeric zero for all supported dtypes.
    #[must_use]
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let len = shape.iter().product::<usize>() * dtype.size_in_bytes();
        Self {
            shape: shape.to_vec(),
            dtype,
            data: vec![0u8; len],
        }
    }

    /// Logical shape (e.g., `[out_features, in_features]` for a 2D weight)
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element dtype
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Raw bytes in `dtype` encoding
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Interpret the data as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if `dtype` is not `F32`.
    #[must_use]
    pub fn as_f32_slice(&self) -> &[f32] {
        assert_eq!(self.dtype, DType::F32, "as_f32_slice: expected F32");
        bytemuck::cast_slice(&self.data)
    }

    /// Copy out the values as f32, widening f16/bf16.
    ///
    /// # Errors
    /// Returns `UnsupportedDtype` for non-float tensors.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self.dtype {
            DType::F32 => Ok(self.as_f32_slice().to_vec()),
            DType::F16 => {
                let f16s: &[half::f16] = bytemuck::cast_slice(&self.data);
                Ok(f16s.iter().map(|v| v.to_f32()).collect())
            }
            DType::BF16 => {
                let bf16s: &[half::bf16] = bytemuck::cast_slice(&self.data);
                Ok(bf16s.iter().map(|v| v.to_f32()).collect())
            }
            DType::U32 => Err(Error::UnsupportedDtype(
                "cannot convert U32 tensor to f32".to_string(),
            )),
        }
    }
}

/// Concatenate tensors along the outer (first) axis.
///
/// Given parts `[a, ...rest]` and `[b, ...rest]`, produces `[a + b, ...rest]`.
/// Used to stack row blocks: a rank's gate and value stripes of a gated MLP
/// projection, or real embedding rows followed by zero padding.
///
/// # Errors
/// Returns `InvalidShape` if `parts` is empty or the parts disagree on dtype,
/// rank, or trailing dimensions.
pub fn concat_rows(parts: &[HostTensor]) -> Result<HostTensor> {
    let first = parts
        .first()
        .ok_or_else(|| Error::InvalidShape("concat_rows: no tensors given".to_string()))?;
    if first.shape.is_empty() {
        return Err(Error::InvalidShape(
            "concat_rows: cannot concatenate 0-dimensional tensors".to_string(),
        ));
    }

    let mut rows = 0;
    let mut total_bytes = 0;
    for part in parts {
        if part.dtype != first.dtype
            || part.shape.len() != first.shape.len()
            || part.shape[1..] != first.shape[1..]
        {
            return Err(Error::InvalidShape(format!(
                "concat_rows: mismatched part {:?} ({}) vs {:?} ({})",
                part.shape, part.dtype, first.shape, first.dtype
            )));
        }
        rows += part.shape[0];
        total_bytes += part.data.len();
    }

    let mut data = Vec::with_capacity(total_bytes);
    for part in parts {
        data.extend_from_slice(&part.data);
    }

    let mut shape = first.shape.clone();
    shape[0] = rows;
    Ok(HostTensor {
        shape,
        dtype: first.dtype,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_roundtrip() {
        let t = HostTensor::from_slice(&[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.as_f32_slice()[4], 5.0);
    }

    #[test]
    fn test_from_raw_length_mismatch() {
        let err = HostTensor::from_raw(vec![2, 2], DType::F32, vec![0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn test_zeros_are_exact() {
        let t = HostTensor::zeros(&[3, 4], DType::F32);
        assert_eq!(t.numel(), 12);
        assert!(t.as_f32_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_to_f32_vec_widens_f16() {
        let values: Vec<half::f16> = [0.5f32, -1.0, 2.0]
            .iter()
            .map(|&v| half::f16::from_f32(v))
            .collect();
        let t = HostTensor::from_slice(&[3], &values);
        assert_eq!(t.to_f32_vec().unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_concat_rows() {
        let a = HostTensor::from_slice(&[1, 2], &[1.0f32, 2.0]);
        let b = HostTensor::from_slice(&[2, 2], &[3.0f32, 4.0, 5.0, 6.0]);
        let c = concat_rows(&[a, b]).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c.as_f32_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_concat_rows_1d() {
        let a = HostTensor::from_slice(&[2], &[1.0f32, 2.0]);
        let b = HostTensor::from_slice(&[1], &[3.0f32]);
        let c = concat_rows(&[a, b]).unwrap();
        assert_eq!(c.shape(), &[3]);
    }

    #[test]
    fn test_concat_rows_shape_mismatch() {
        let a = HostTensor::from_slice(&[1, 2], &[1.0f32, 2.0]);
        let b = HostTensor::from_slice(&[1, 3], &[3.0f32, 4.0, 5.0]);
        assert!(concat_rows(&[a, b]).is_err());
    }
}
