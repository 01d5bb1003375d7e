//! Weight sources and lazy slice handles

mod memory;
mod safetensors;
mod source;

pub use memory::InMemorySource;
pub use self::safetensors::SafeTensorsSource;
pub use source::{SliceView, WeightSource};
