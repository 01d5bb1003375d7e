//! Weight source trait and lazy slice handles.
//!
//! [`WeightSource`] is implemented by checkpoint readers (SafeTensors files,
//! in-memory maps). [`SliceView`] is the lazy handle a source hands out for
//! one stored tensor: it exposes shape and dtype without materializing data,
//! and reads sub-ranges on demand so a rank never has to hold a full tensor
//! it only owns a slice of.

use crate::dtype::DType;
use crate::tensor::HostTensor;
use crate::{Error, Result};

/// A lazy view over one stored tensor.
pub trait SliceView {
    /// Shape of the underlying tensor
    fn shape(&self) -> &[usize];

    /// Element dtype of the underlying tensor
    fn dtype(&self) -> DType;

    /// Read exactly the sub-range `[start, end)` along `axis`, returning a
    /// materialized tensor. Implementations must not touch data outside the
    /// requested range when the backing store supports partial reads.
    ///
    /// # Errors
    /// Returns `RangeOverflow` if the range exceeds the axis extent, and
    /// `InvalidShape` for an out-of-range axis.
    fn read_range(&self, axis: usize, start: usize, end: usize) -> Result<HostTensor>;

    /// Materialize the whole tensor.
    ///
    /// # Errors
    /// Returns an error if the read fails.
    fn read_all(&self) -> Result<HostTensor> {
        match self.shape().first() {
            Some(&extent) => self.read_range(0, 0, extent),
            None => Err(Error::InvalidShape(
                "cannot materialize a 0-dimensional slice".to_string(),
            )),
        }
    }
}

/// A named collection of tensors backing a checkpoint.
pub trait WeightSource {
    /// Check if a tensor exists
    fn contains(&self, name: &str) -> bool;

    /// Get the shape of a tensor without loading it
    fn get_shape(&self, name: &str) -> Result<Vec<usize>>;

    /// Get the dtype of a tensor
    fn get_dtype(&self, name: &str) -> Result<DType>;

    /// List all tensor names in the source
    fn tensor_names(&self) -> Vec<String>;

    /// Open a lazy slice view over a tensor
    ///
    /// # Errors
    /// Returns `WeightNotFound` if no tensor has this name.
    fn open_slice(&self, name: &str) -> Result<Box<dyn SliceView + '_>>;

    /// Load a full tensor by name
    ///
    /// # Errors
    /// Returns `WeightNotFound` if no tensor has this name.
    fn load(&self, name: &str) -> Result<HostTensor> {
        self.open_slice(name)?.read_all()
    }
}

/// Copy the byte runs of `[start, end)` along `axis` out of a row-major
/// buffer. Shared by the slice-view implementations; the only data touched
/// is the `outer` contiguous runs inside the requested range.
pub(crate) fn copy_axis_range(
    data: &[u8],
    shape: &[usize],
    dtype: DType,
    axis: usize,
    start: usize,
    end: usize,
) -> Result<HostTensor> {
    let extent = *shape.get(axis).ok_or_else(|| {
        Error::InvalidShape(format!("axis {axis} out of range for shape {shape:?}"))
    })?;
    if start > end || end > extent {
        return Err(Error::RangeOverflow {
            axis,
            start,
            end,
            extent,
        });
    }

    let elem = dtype.size_in_bytes();
    let outer: usize = shape[..axis].iter().product();
    let inner: usize = shape[axis + 1..].iter().product::<usize>() * elem;
    let run = (end - start) * inner;

    let mut out = Vec::with_capacity(outer * run);
    for o in 0..outer {
        let base = (o * extent + start) * inner;
        out.extend_from_slice(&data[base..base + run]);
    }

    let mut out_shape = shape.to_vec();
    out_shape[axis] = end - start;
    HostTensor::from_raw(out_shape, dtype, out)
}
