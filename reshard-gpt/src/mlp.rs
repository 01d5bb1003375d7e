//! MLP projection sharding.
//!
//! For plain activations `c_fc` is column-parallel and `c_proj` row-parallel,
//! the same pattern as attention. Gated-linear-unit activations need their
//! own rule: `c_fc` stores the gate block and the value block stacked along
//! the output axis, and a naive column split would hand each rank gate rows
//! paired with value rows from the wrong half. Viewing the axis as
//! `2 * world_size` equal stripes, rank `r` owns stripe `r` (gate half) and
//! stripe `world_size + r` (value half), stacked gate-first.

use reshard::{
    column_parallel_weights, concat_rows, divide_evenly, row_parallel_weights, HostTensor, Result,
    ShardConfig, SliceView, TensorMap, WeightSource,
};

use crate::config::GptConfig;
use crate::state_dict::merge;

/// Shard one layer's MLP weights under `prefix` (e.g. `transformer.h.3.mlp.`).
///
/// # Errors
/// Returns `WeightNotFound` for an absent projection and `Indivisible` when
/// a gated `c_fc` does not tile into `2 * world_size` stripes.
pub fn mlp_weights(
    config: &GptConfig,
    source: &impl WeightSource,
    prefix: &str,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let mut out = if config.is_glu() {
        gated_fc_weights(config, source, prefix, shard)?
    } else {
        column_parallel_weights(source, &format!("{prefix}c_fc."), config.add_bias, shard)?
    };

    merge(
        &mut out,
        row_parallel_weights(source, &format!("{prefix}c_proj."), config.add_bias, shard)?,
    );

    Ok(out)
}

fn gated_fc_weights(
    config: &GptConfig,
    source: &impl WeightSource,
    prefix: &str,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let mut out = TensorMap::new();

    let name = format!("{prefix}c_fc.weight");
    let weight = source.open_slice(&name)?;
    out.insert(name, gated_stripes(weight.as_ref(), shard)?);

    if config.add_bias {
        let name = format!("{prefix}c_fc.bias");
        let bias = source.open_slice(&name)?;
        out.insert(name, gated_stripes(bias.as_ref(), shard)?);
    }

    Ok(out)
}

/// Read a rank's gate stripe and value stripe of a fused gate/value tensor
/// and stack them gate-first.
fn gated_stripes(slice: &dyn SliceView, shard: &ShardConfig) -> Result<HostTensor> {
    let rows = slice.shape()[0];
    let stride = divide_evenly(rows, 2 * shard.world_size, "gated c_fc rows")?;

    let gate = slice.read_range(0, shard.rank * stride, (shard.rank + 1) * stride)?;
    let value_start = (shard.world_size + shard.rank) * stride;
    let value = slice.read_range(0, value_start, value_start + stride)?;

    concat_rows(&[gate, value])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttentionHeadType, PositionEmbeddingType};
    use reshard::InMemorySource;

    fn iota(shape: &[usize]) -> HostTensor {
        let n: usize = shape.iter().product();
        let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
        HostTensor::from_slice(shape, &values)
    }

    fn config(activation: &str, add_bias: bool) -> GptConfig {
        GptConfig {
            vocab_size: 16,
            n_positions: 16,
            n_embd: 4,
            n_layer: 1,
            n_head: 2,
            num_key_value_heads: None,
            attention_head_type: AttentionHeadType::Mha,
            position_embedding_type: PositionEmbeddingType::LearnedAbsolute,
            activation_function: activation.to_string(),
            add_bias,
            tie_word_embeddings: true,
            layer_norm_epsilon: 1e-5,
        }
    }

    /// 16 fused rows (stride 4), world_size=2: rank 0 stacks rows [0, 4) and
    /// [8, 12); rank 1 stacks rows [4, 8) and [12, 16).
    #[test]
    fn test_glu_stripe_split() {
        let config = config("swiglu", true);
        let mut source = InMemorySource::new();
        source.insert("mlp.c_fc.weight", iota(&[16, 4]));
        source.insert("mlp.c_fc.bias", iota(&[16]));
        source.insert("mlp.c_proj.weight", iota(&[4, 8]));
        source.insert("mlp.c_proj.bias", iota(&[4]));

        let rank0 = ShardConfig { rank: 0, world_size: 2 };
        let rank1 = ShardConfig { rank: 1, world_size: 2 };
        let out0 = mlp_weights(&config, &source, "mlp.", &rank0).unwrap();
        let out1 = mlp_weights(&config, &source, "mlp.", &rank1).unwrap();

        let full = source.load("mlp.c_fc.weight").unwrap();
        let rows = full.as_f32_slice();

        let fc0 = &out0["mlp.c_fc.weight"];
        assert_eq!(fc0.shape(), &[8, 4]);
        assert_eq!(&fc0.as_f32_slice()[..16], &rows[0..16]); // rows [0, 4)
        assert_eq!(&fc0.as_f32_slice()[16..], &rows[32..48]); // rows [8, 12)

        let fc1 = &out1["mlp.c_fc.weight"];
        assert_eq!(&fc1.as_f32_slice()[..16], &rows[16..32]); // rows [4, 8)
        assert_eq!(&fc1.as_f32_slice()[16..], &rows[48..64]); // rows [12, 16)

        // Bias follows the same stripes
        assert_eq!(
            out0["mlp.c_fc.bias"].as_f32_slice(),
            &[0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 10.0, 11.0]
        );
        assert_eq!(
            out1["mlp.c_fc.bias"].as_f32_slice(),
            &[4.0, 5.0, 6.0, 7.0, 12.0, 13.0, 14.0, 15.0]
        );
    }

    #[test]
    fn test_plain_mlp_is_column_then_row() {
        let config = config("gelu_pytorch_tanh", false);
        let mut source = InMemorySource::new();
        source.insert("mlp.c_fc.weight", iota(&[16, 4]));
        source.insert("mlp.c_proj.weight", iota(&[4, 16]));

        let shard = ShardConfig { rank: 1, world_size: 2 };
        let out = mlp_weights(&config, &source, "mlp.", &shard).unwrap();

        assert_eq!(out["mlp.c_fc.weight"].shape(), &[8, 4]);
        assert_eq!(out["mlp.c_proj.weight"].shape(), &[4, 8]);
        // add_bias false: no bias keys at all
        assert!(!out.contains_key("mlp.c_fc.bias"));
        assert!(!out.contains_key("mlp.c_proj.bias"));
    }

    #[test]
    fn test_glu_indivisible_rows() {
        let config = config("geglu", false);
        let mut source = InMemorySource::new();
        source.insert("mlp.c_fc.weight", iota(&[10, 4]));
        source.insert("mlp.c_proj.weight", iota(&[4, 5]));

        let shard = ShardConfig { rank: 0, world_size: 4 };
        let err = mlp_weights(&config, &source, "mlp.", &shard).unwrap_err();
        assert_eq!(
            err.to_string(),
            "gated c_fc rows (10) is not evenly divisible by 8"
        );
    }
}
