//! Reshard: tensor-parallel checkpoint resharding primitives
//!
//! This crate provides the format- and topology-level pieces for converting
//! a monolithic transformer checkpoint into the sharded layout one
//! tensor-parallel rank loads: partition arithmetic over a rank/world-size
//! topology, lazy ranged reads over memory-mapped SafeTensors files, and the
//! generic column/row-parallel weight splits. Architecture-specific sharding
//! rules live in separate crates (e.g. `reshard-gpt`).

pub mod dtype;
pub mod error;
pub mod partition;
pub mod shard;
pub mod tensor;
pub mod weights;

pub use dtype::{DType, TensorDType};
pub use error::{Error, Result};
pub use partition::{column_parallel_weights, row_parallel_weights, shard_axis};
pub use shard::{divide_evenly, Partition, ShardConfig};
pub use tensor::{concat_rows, HostTensor, TensorMap};
pub use weights::{InMemorySource, SafeTensorsSource, SliceView, WeightSource};
