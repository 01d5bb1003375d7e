//! Attention projection sharding.
//!
//! The fused input projection `c_attn` stores Q, K, V stacked along the
//! output-feature axis. How it splits depends on the head layout:
//!
//! - multi-head and grouped attention keep per-head (or per-group) K/V
//!   projections inside each rank's block, so the fused tensor is plain
//!   column-parallel;
//! - multi-query attention has a single K/V projection shared by all heads.
//!   Only the Q rows split across ranks; the K/V rows are replicated, and
//!   the result is emitted as separate `q_attn`/`kv_attn` tensors because
//!   that is how the multi-query attention module consumes them.
//!
//! The output projection `c_proj` is row-parallel for every head layout.

use reshard::{
    column_parallel_weights, divide_evenly, row_parallel_weights, Result, ShardConfig,
    TensorMap, WeightSource,
};

use crate::config::{AttentionHeadType, GptConfig};
use crate::state_dict::merge;

/// Shard one layer's attention weights under `prefix`
/// (e.g. `transformer.h.3.attn.`).
///
/// # Errors
/// Returns `WeightNotFound` for an absent projection and `Indivisible` when
/// the Q rows do not split evenly across ranks.
pub fn attention_weights(
    config: &GptConfig,
    source: &impl WeightSource,
    prefix: &str,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let mut out = match config.attention_head_type {
        AttentionHeadType::Mqa => multi_query_attn_weights(config, source, prefix, shard)?,
        AttentionHeadType::Mha | AttentionHeadType::Gqa => {
            column_parallel_weights(source, &format!("{prefix}c_attn."), config.add_bias, shard)?
        }
    };

    merge(
        &mut out,
        row_parallel_weights(source, &format!("{prefix}c_proj."), config.add_bias, shard)?,
    );

    Ok(out)
}

fn multi_query_attn_weights(
    config: &GptConfig,
    source: &impl WeightSource,
    prefix: &str,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let hidden = config.n_embd;
    let head_dim = config.head_dim()?;
    let q_per_rank = divide_evenly(hidden, shard.world_size, "hidden size n_embd")?;
    let q_start = shard.rank * q_per_rank;
    let q_end = (shard.rank + 1) * q_per_rank;

    let mut out = TensorMap::new();

    let weight = source.open_slice(&format!("{prefix}c_attn.weight"))?;
    out.insert(
        format!("{prefix}c_attn.q_attn.weight"),
        weight.read_range(0, q_start, q_end)?,
    );
    // K and V follow the Q rows and are shared by all heads: every rank
    // reads the same 2*head_dim rows.
    out.insert(
        format!("{prefix}c_attn.kv_attn.weight"),
        weight.read_range(0, hidden, hidden + 2 * head_dim)?,
    );

    if config.add_bias {
        let bias = source.open_slice(&format!("{prefix}c_attn.bias"))?;
        out.insert(
            format!("{prefix}c_attn.q_attn.bias"),
            bias.read_range(0, q_start, q_end)?,
        );
        out.insert(
            format!("{prefix}c_attn.kv_attn.bias"),
            bias.read_range(0, hidden, hidden + 2 * head_dim)?,
        );
    }

    Ok(out)
}
