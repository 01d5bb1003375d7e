//! GPT model family configuration
//!
//! Parsed from the checkpoint's `config.json`. Covers the GPT lineage this
//! crate reshards: learned/ALiBi/rotary position embeddings, fused
//! `c_attn` attention in multi-head, multi-query, or grouped variants, and
//! plain or gated-linear-unit MLPs.

use std::path::Path;

use serde::Deserialize;

use reshard::{divide_evenly, Error, Result};

/// Attention head layout of the fused `c_attn` projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionHeadType {
    /// Every head has its own K/V projection
    Mha,
    /// All heads share a single K/V projection
    Mqa,
    /// Heads share K/V projections in groups
    Gqa,
}

/// Position embedding variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEmbeddingType {
    /// Learned absolute embeddings (`transformer.wpe`)
    LearnedAbsolute,
    /// Attention-bias slopes, no embedding table
    Alibi,
    /// Rotary embeddings, no embedding table
    Rope,
}

/// Configuration for GPT-family models
#[derive(Debug, Clone, Deserialize)]
pub struct GptConfig {
    /// Vocabulary size
    pub vocab_size: usize,

    /// Maximum sequence length (rows of `wpe` when learned-absolute)
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,

    /// Hidden dimension size
    pub n_embd: usize,

    /// Number of transformer layers
    pub n_layer: usize,

    /// Number of attention heads
    pub n_head: usize,

    /// Number of key-value heads (GQA only)
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,

    /// Attention head layout
    #[serde(default = "default_attention_head_type")]
    pub attention_head_type: AttentionHeadType,

    /// Position embedding variant
    #[serde(default = "default_position_embedding_type")]
    pub position_embedding_type: PositionEmbeddingType,

    /// Activation function name; a `*glu` suffix marks a gated MLP
    #[serde(default = "default_activation_function")]
    pub activation_function: String,

    /// Whether linear projections carry bias terms
    #[serde(default = "default_true")]
    pub add_bias: bool,

    /// Share the input embedding table with the output head
    #[serde(default = "default_true")]
    pub tie_word_embeddings: bool,

    /// Layer norm epsilon
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f32,
}

fn default_n_positions() -> usize {
    1024
}

fn default_attention_head_type() -> AttentionHeadType {
    AttentionHeadType::Mha
}

fn default_position_embedding_type() -> PositionEmbeddingType {
    PositionEmbeddingType::LearnedAbsolute
}

fn default_activation_function() -> String {
    "gelu_pytorch_tanh".to_string()
}

fn default_true() -> bool {
    true
}

fn default_layer_norm_epsilon() -> f32 {
    1e-5
}

impl GptConfig {
    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Per-head dimension, `n_embd / n_head`.
    ///
    /// # Errors
    /// Returns `Indivisible` when the heads do not tile the hidden size.
    pub fn head_dim(&self) -> Result<usize> {
        divide_evenly(self.n_embd, self.n_head, "hidden size n_embd")
    }

    /// Whether the MLP's first projection is a gated linear unit.
    ///
    /// Matches the checkpoint naming convention: `swiglu`, `geglu`,
    /// `reglu`, plain `glu`, ... all end in `glu`.
    #[must_use]
    pub fn is_glu(&self) -> bool {
        self.activation_function.to_ascii_lowercase().ends_with("glu")
    }

    /// Check the internal consistency of the descriptor.
    ///
    /// # Errors
    /// Returns an error for a head count that does not tile `n_embd`, a
    /// key-value head count incompatible with the head layout, or an empty
    /// model.
    pub fn validate(&self) -> Result<()> {
        self.head_dim()?;
        if self.n_layer == 0 {
            return Err(Error::InvalidShape("n_layer must be positive".to_string()));
        }
        match self.attention_head_type {
            AttentionHeadType::Mha => {}
            AttentionHeadType::Mqa => {
                if self.num_key_value_heads.is_some_and(|n| n != 1) {
                    return Err(Error::InvalidShape(
                        "multi-query attention implies num_key_value_heads = 1".to_string(),
                    ));
                }
            }
            AttentionHeadType::Gqa => {
                let kv_heads = self.num_key_value_heads.ok_or_else(|| {
                    Error::InvalidShape(
                        "grouped attention requires num_key_value_heads".to_string(),
                    )
                })?;
                divide_evenly(self.n_head, kv_heads, "attention heads n_head")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqa_config() {
        let json = r#"{
            "vocab_size": 49152,
            "n_positions": 8192,
            "n_embd": 6144,
            "n_layer": 40,
            "n_head": 48,
            "attention_head_type": "mqa",
            "position_embedding_type": "learned_absolute",
            "activation_function": "gelu_pytorch_tanh",
            "add_bias": true,
            "tie_word_embeddings": true
        }"#;

        let config: GptConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.attention_head_type, AttentionHeadType::Mqa);
        assert_eq!(config.head_dim().unwrap(), 128);
        assert!(!config.is_glu());
        config.validate().unwrap();
    }

    #[test]
    fn test_glu_config_defaults() {
        let json = r#"{
            "vocab_size": 32000,
            "n_embd": 1024,
            "n_layer": 4,
            "n_head": 8,
            "position_embedding_type": "rope",
            "activation_function": "swiglu",
            "add_bias": false,
            "tie_word_embeddings": false
        }"#;

        let config: GptConfig = serde_json::from_str(json).unwrap();
        // Defaults fill what the JSON omits
        assert_eq!(config.n_positions, 1024);
        assert_eq!(config.attention_head_type, AttentionHeadType::Mha);
        assert!((config.layer_norm_epsilon - 1e-5).abs() < f32::EPSILON);
        assert!(config.is_glu());
        assert!(!config.add_bias);
        config.validate().unwrap();
    }

    #[test]
    fn test_glu_detection_variants() {
        for (name, expected) in [
            ("swiglu", true),
            ("geglu", true),
            ("reglu", true),
            ("gelu", false),
            ("relu", false),
        ] {
            let config = GptConfig {
                vocab_size: 16,
                n_positions: 16,
                n_embd: 8,
                n_layer: 1,
                n_head: 2,
                num_key_value_heads: None,
                attention_head_type: AttentionHeadType::Mha,
                position_embedding_type: PositionEmbeddingType::Rope,
                activation_function: name.to_string(),
                add_bias: false,
                tie_word_embeddings: true,
                layer_norm_epsilon: 1e-5,
            };
            assert_eq!(config.is_glu(), expected, "{name}");
        }
    }

    #[test]
    fn test_head_dim_indivisible() {
        let json = r#"{
            "vocab_size": 16,
            "n_embd": 100,
            "n_layer": 2,
            "n_head": 3
        }"#;
        let config: GptConfig = serde_json::from_str(json).unwrap();
        let err = config.head_dim().unwrap_err();
        assert_eq!(
            err.to_string(),
            "hidden size n_embd (100) is not evenly divisible by 3"
        );
    }

    #[test]
    fn test_validate_gqa_needs_kv_heads() {
        let json = r#"{
            "vocab_size": 16,
            "n_embd": 96,
            "n_layer": 2,
            "n_head": 12,
            "attention_head_type": "gqa"
        }"#;
        let config: GptConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{
            "vocab_size": 16,
            "n_embd": 96,
            "n_layer": 2,
            "n_head": 12,
            "num_key_value_heads": 4,
            "attention_head_type": "gqa"
        }"#;
        let config: GptConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
    }
}
