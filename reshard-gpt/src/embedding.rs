//! Embedding table sharding.

use reshard::{
    concat_rows, Error, HostTensor, Result, ShardConfig, TensorMap, WeightSource,
};

/// Shard `{prefix}weight`, an embedding table of `vocab_size` rows.
///
/// With `shard_vocab` false the full table is returned (replicated on every
/// rank). With it true, the rank reads its contiguous block of vocabulary
/// rows; when `vocab_size` does not divide evenly, trailing rank(s) come up
/// short and are zero-padded back to the nominal block so the local table
/// has the same shape on every rank. Padding rows are exact zeros appended
/// after the real rows.
///
/// # Errors
/// Returns `WeightNotFound` when the table is absent.
pub fn word_embedding_weights(
    source: &impl WeightSource,
    prefix: &str,
    vocab_size: usize,
    shard_vocab: bool,
    shard: &ShardConfig,
) -> Result<TensorMap> {
    let name = format!("{prefix}weight");

    if !shard_vocab {
        let weight = source.load(&name)?;
        let mut out = TensorMap::new();
        out.insert(name, weight);
        return Ok(out);
    }

    let slice = source.open_slice(&name)?;
    if slice.shape().len() != 2 {
        return Err(Error::InvalidShape(format!(
            "embedding table {name} must be 2D, got {:?}",
            slice.shape()
        )));
    }
    let hidden = slice.shape()[1];

    let p = shard.partition(vocab_size);
    let rows = slice.read_range(0, p.start, p.end)?;

    let weight = if p.len() < p.block {
        let padding = HostTensor::zeros(&[p.block - p.len(), hidden], rows.dtype());
        concat_rows(&[rows, padding])?
    } else {
        rows
    };

    let mut out = TensorMap::new();
    out.insert(name, weight);
    Ok(out)
}
