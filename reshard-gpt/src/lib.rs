//! GPT-family tensor-parallel checkpoint resharding.
//!
//! Converts a monolithic GPT-family checkpoint into the state dict one
//! tensor-parallel rank loads: vocabulary-sharded (and padded) embeddings,
//! column/row-parallel attention and MLP projections, the multi-query
//! Q/KV split, and the gated-MLP stripe split. The entry point is
//! [`sharded_state_dict`]; format- and topology-level plumbing comes from
//! the `reshard` crate.

pub mod attention;
pub mod config;
pub mod embedding;
pub mod mlp;
pub mod state_dict;

pub use attention::attention_weights;
pub use config::{AttentionHeadType, GptConfig, PositionEmbeddingType};
pub use embedding::word_embedding_weights;
pub use mlp::mlp_weights;
pub use state_dict::sharded_state_dict;
