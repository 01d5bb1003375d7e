//! SafeTensors checkpoint reading with memory mapping.
//!
//! Maps each `.safetensors` file and indexes tensor byte ranges up front;
//! tensor data is only paged in when a slice view reads it. Ranged reads copy
//! just the requested byte runs, so slicing a large tensor never materializes
//! the whole thing.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use safetensors::tensor::SafeTensors;
use tracing::debug;

use crate::dtype::DType;
use crate::tensor::HostTensor;
use crate::weights::source::{copy_axis_range, SliceView, WeightSource};
use crate::{Error, Result};

/// A weight source over memory-mapped SafeTensors files.
///
/// Handles single-file and sharded (multi-file) checkpoints; tensor names
/// must be unique across all files.
#[derive(Debug)]
pub struct SafeTensorsSource {
    /// Memory-mapped files (kept alive for the lifetime of the source)
    mmaps: Vec<Mmap>,
    /// Tensor metadata by name
    index: HashMap<String, TensorMeta>,
}

#[derive(Debug)]
struct TensorMeta {
    file_idx: usize,
    dtype: DType,
    shape: Vec<usize>,
    data_start: usize,
    data_end: usize,
}

impl SafeTensorsSource {
    /// Open a single SafeTensors file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_files(&[path.as_ref().to_path_buf()])
    }

    /// Open multiple SafeTensors files (multi-file checkpoints)
    ///
    /// # Errors
    /// Returns an error if any file cannot be opened or parsed, or if two
    /// files declare the same tensor name
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut mmaps = Vec::with_capacity(paths.len());
        let mut index = HashMap::new();

        for (file_idx, path) in paths.iter().enumerate() {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };

            let st = SafeTensors::deserialize(&mmap).map_err(|e| {
                Error::SafeTensors(format!("Failed to parse {}: {e}", path.display()))
            })?;

            let mut file_tensors = 0usize;
            for (name, view) in st.tensors() {
                let dtype = dtype_from_safetensors(view.dtype())?;
                let shape: Vec<usize> = view.shape().to_vec();

                // Byte range of the tensor data within the mmap
                let data = view.data();
                let data_start = data.as_ptr() as usize - mmap.as_ptr() as usize;
                let data_end = data_start + data.len();

                let meta = TensorMeta {
                    file_idx,
                    dtype,
                    shape,
                    data_start,
                    data_end,
                };
                if index.insert(name.clone(), meta).is_some() {
                    return Err(Error::SafeTensors(format!(
                        "Duplicate tensor '{name}' in {}",
                        path.display()
                    )));
                }
                file_tensors += 1;
            }

            debug!(
                path = %path.display(),
                tensors = file_tensors,
                "mapped checkpoint file"
            );
            mmaps.push(mmap);
        }

        Ok(Self { mmaps, index })
    }

    /// Open every `.safetensors` file in a directory, in sorted order
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read, contains no
    /// SafeTensors files, or a file fails to parse
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "safetensors"))
            .collect();

        if paths.is_empty() {
            return Err(Error::SafeTensors(format!(
                "No .safetensors files in {}",
                dir.display()
            )));
        }

        // Sort for a deterministic index regardless of readdir order
        paths.sort();

        Self::from_files(&paths)
    }

    fn meta(&self, name: &str) -> Result<&TensorMeta> {
        self.index
            .get(name)
            .ok_or_else(|| Error::WeightNotFound(name.to_string()))
    }
}

impl WeightSource for SafeTensorsSource {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn get_shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.meta(name)?.shape.clone())
    }

    fn get_dtype(&self, name: &str) -> Result<DType> {
        Ok(self.meta(name)?.dtype)
    }

    fn tensor_names(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    fn open_slice(&self, name: &str) -> Result<Box<dyn SliceView + '_>> {
        let meta = self.meta(name)?;
        Ok(Box::new(SafeTensorsSlice {
            data: &self.mmaps[meta.file_idx][meta.data_start..meta.data_end],
            shape: &meta.shape,
            dtype: meta.dtype,
        }))
    }
}

/// Lazy view over one tensor in a mapped file. Reads page in only the
/// byte runs they cover.
struct SafeTensorsSlice<'a> {
    data: &'a [u8],
    shape: &'a [usize],
    dtype: DType,
}

impl SliceView for SafeTensorsSlice<'_> {
    fn shape(&self) -> &[usize] {
        self.shape
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn read_range(&self, axis: usize, start: usize, end: usize) -> Result<HostTensor> {
        copy_axis_range(self.data, self.shape, self.dtype, axis, start, end)
    }
}

/// Convert a SafeTensors dtype to ours
fn dtype_from_safetensors(dtype: safetensors::Dtype) -> Result<DType> {
    match dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::BF16 => Ok(DType::BF16),
        safetensors::Dtype::U32 => Ok(DType::U32),
        other => Err(Error::UnsupportedDtype(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_conversion() {
        assert!(matches!(
            dtype_from_safetensors(safetensors::Dtype::F32),
            Ok(DType::F32)
        ));
        assert!(matches!(
            dtype_from_safetensors(safetensors::Dtype::BF16),
            Ok(DType::BF16)
        ));
        assert!(dtype_from_safetensors(safetensors::Dtype::I64).is_err());
    }
}
