//! In-memory weight source.
//!
//! Backs a checkpoint with a plain name → tensor map. Used by unit tests and
//! by callers that already hold tensors in memory (e.g. a checkpoint just
//! produced by another tool).

use std::collections::HashMap;

use crate::dtype::DType;
use crate::tensor::HostTensor;
use crate::weights::source::{copy_axis_range, SliceView, WeightSource};
use crate::{Error, Result};

/// A weight source over tensors held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    tensors: HashMap<String, HostTensor>,
}

impl InMemorySource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tensor under `name`, replacing any previous entry
    pub fn insert(&mut self, name: impl Into<String>, tensor: HostTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    fn get(&self, name: &str) -> Result<&HostTensor> {
        self.tensors
            .get(name)
            .ok_or_else(|| Error::WeightNotFound(name.to_string()))
    }
}

impl WeightSource for InMemorySource {
    fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    fn get_shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.get(name)?.shape().to_vec())
    }

    fn get_dtype(&self, name: &str) -> Result<DType> {
        Ok(self.get(name)?.dtype())
    }

    fn tensor_names(&self) -> Vec<String> {
        self.tensors.keys().cloned().collect()
    }

    fn open_slice(&self, name: &str) -> Result<Box<dyn SliceView + '_>> {
        Ok(Box::new(InMemorySlice {
            tensor: self.get(name)?,
        }))
    }

    fn load(&self, name: &str) -> Result<HostTensor> {
        Ok(self.get(name)?.clone())
    }
}

struct InMemorySlice<'a> {
    tensor: &'a HostTensor,
}

impl SliceView for InMemorySlice<'_> {
    fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    fn dtype(&self) -> DType {
        self.tensor.dtype()
    }

    fn read_range(&self, axis: usize, start: usize, end: usize) -> Result<HostTensor> {
        copy_axis_range(
            self.tensor.data(),
            self.tensor.shape(),
            self.tensor.dtype(),
            axis,
            start,
            end,
        )
    }
}
