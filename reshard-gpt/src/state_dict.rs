//! Rank-local state dict assembly.
//!
//! Walks the full checkpoint layout (embeddings, every transformer layer's
//! norms/attention/MLP, the final norm, the untied output head) and produces
//! the flat name → tensor mapping holding exactly the values this rank loads.
//! The walk is a pure sequence of reads: given identical inputs every rank
//! computes its shard independently, with no cross-rank coordination.

use tracing::{debug, info};

use reshard::{Result, ShardConfig, TensorMap, WeightSource};

use crate::attention::attention_weights;
use crate::config::{GptConfig, PositionEmbeddingType};
use crate::embedding::word_embedding_weights;
use crate::mlp::mlp_weights;

/// Build the state dict for one tensor-parallel rank.
///
/// `shard_vocab` selects whether the word-embedding (and untied `lm_head`)
/// tables split across the vocabulary or are replicated. Deterministic given
/// identical inputs; the caller owns the returned mapping.
///
/// # Errors
/// Returns `WeightNotFound` for any absent required tensor (the error names
/// the key) and `Indivisible` when a dimension does not tile across ranks.
pub fn sharded_state_dict(
    config: &GptConfig,
    source: &impl WeightSource,
    shard: &ShardConfig,
    shard_vocab: bool,
) -> Result<TensorMap> {
    let mut state_dict = word_embedding_weights(
        source,
        "transformer.wte.",
        config.vocab_size,
        shard_vocab,
        shard,
    )?;

    // Only learned-absolute positions have a table; it is small and must
    // match exactly across ranks, so it is never vocab-sharded.
    if config.position_embedding_type == PositionEmbeddingType::LearnedAbsolute {
        merge(
            &mut state_dict,
            word_embedding_weights(source, "transformer.wpe.", config.n_positions, false, shard)?,
        );
    }

    for layer_idx in 0..config.n_layer {
        let prefix = format!("transformer.h.{layer_idx}.");

        merge(&mut state_dict, norm_weights(source, &format!("{prefix}ln_1."))?);
        merge(
            &mut state_dict,
            attention_weights(config, source, &format!("{prefix}attn."), shard)?,
        );
        merge(&mut state_dict, norm_weights(source, &format!("{prefix}ln_2."))?);
        merge(
            &mut state_dict,
            mlp_weights(config, source, &format!("{prefix}mlp."), shard)?,
        );

        debug!(layer = layer_idx, "sharded transformer layer");
    }

    merge(&mut state_dict, norm_weights(source, "transformer.ln_f.")?);

    if !config.tie_word_embeddings {
        merge(
            &mut state_dict,
            word_embedding_weights(source, "lm_head.", config.vocab_size, shard_vocab, shard)?,
        );
    }

    info!(
        rank = shard.rank,
        world_size = shard.world_size,
        tensors = state_dict.len(),
        "assembled tensor-parallel state dict"
    );

    Ok(state_dict)
}

/// Copy a normalization weight/bias pair verbatim. Norm parameters are
/// per-channel and applied before any split, so every rank carries the full
/// vector. The bias is probed with `contains`; RMS-norm checkpoints simply
/// do not store one.
fn norm_weights(source: &impl WeightSource, prefix: &str) -> Result<TensorMap> {
    let mut out = TensorMap::new();

    let weight_name = format!("{prefix}weight");
    let weight = source.load(&weight_name)?;
    out.insert(weight_name, weight);

    let bias_name = format!("{prefix}bias");
    if source.contains(&bias_name) {
        let bias = source.load(&bias_name)?;
        out.insert(bias_name, bias);
    }

    Ok(out)
}

/// Merge `from` into `into`. Key prefixes are distinct by construction, so a
/// collision is a bug in the walk, not a data error.
pub(crate) fn merge(into: &mut TensorMap, from: TensorMap) {
    for (name, tensor) in from {
        assert!(
            into.insert(name.clone(), tensor).is_none(),
            "duplicate state-dict key: {name}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reshard::{HostTensor, InMemorySource};

    #[test]
    fn test_norm_weights_optional_bias() {
        let mut source = InMemorySource::new();
        source.insert("ln.weight", HostTensor::from_slice(&[4], &[1.0f32; 4]));

        let out = norm_weights(&source, "ln.").unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("ln.weight"));

        source.insert("ln.bias", HostTensor::from_slice(&[4], &[0.0f32; 4]));
        let out = norm_weights(&source, "ln.").unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_norm_weights_missing_weight_is_fatal() {
        let source = InMemorySource::new();
        let err = norm_weights(&source, "ln.").unwrap_err();
        assert_eq!(err.to_string(), "Weight not found: ln.weight");
    }

    #[test]
    #[should_panic(expected = "duplicate state-dict key")]
    fn test_merge_rejects_collisions() {
        let tensor = HostTensor::from_slice(&[1], &[0.0f32]);
        let mut a = TensorMap::new();
        a.insert("x".to_string(), tensor.clone());
        let mut b = TensorMap::new();
        b.insert("x".to_string(), tensor);
        merge(&mut a, b);
    }
}
