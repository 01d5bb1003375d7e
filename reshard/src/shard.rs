//! Tensor-parallel topology and partition arithmetic.
//!
//! Describes one process's position in a tensor-parallel group and computes
//! the contiguous sub-range of a dimension that process owns. Every sharding
//! rule takes a [`ShardConfig`] explicitly; there is no ambient process-group
//! state.

use crate::{Error, Result};

/// Describes this rank's position in a tensor-parallel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    /// This process's rank (`0..world_size`)
    pub rank: usize,
    /// Total number of ranks in the tensor-parallel group
    pub world_size: usize,
}

impl ShardConfig {
    /// Create a validated topology.
    ///
    /// # Errors
    /// Returns `InvalidTopology` unless `rank < world_size` and
    /// `world_size >= 1`.
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 || rank >= world_size {
            return Err(Error::InvalidTopology { rank, world_size });
        }
        Ok(Self { rank, world_size })
    }

    /// The degenerate single-process topology.
    #[must_use]
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: 1,
        }
    }

    /// Compute this rank's contiguous block of a dimension of size `total`.
    ///
    /// The nominal block is `ceil(total / world_size)`; rank `r` owns
    /// `[r*block, (r+1)*block)` clamped to `total`. Ranges over all ranks are
    /// disjoint and cover `[0, total)` exactly; every rank except possibly
    /// the trailing one(s) gets the full block. Callers that need every rank
    /// to end up with `block` elements regardless (vocabulary tables) pad the
    /// short tail themselves.
    #[must_use]
    pub fn partition(&self, total: usize) -> Partition {
        let block = total.div_ceil(self.world_size);
        let start = (self.rank * block).min(total);
        let end = ((self.rank + 1) * block).min(total);
        Partition { start, end, block }
    }
}

/// One rank's sub-range of a partitioned dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// First owned index
    pub start: usize,
    /// One past the last owned index; `end - start` may fall short of
    /// `block` on the trailing rank(s)
    pub end: usize,
    /// Nominal per-rank block size, `ceil(total / world_size)`
    pub block: usize,
}

impl Partition {
    /// Number of indices actually owned
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when this rank owns no real indices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Divide `size` by `divisor`, or fail with a descriptive error.
///
/// For dimensions that must split exactly among ranks (or into a fixed
/// stripe grid): fused projection rows, head dimensions, gated-MLP strides.
///
/// # Errors
/// Returns `Indivisible` naming `what` when the division has a remainder.
pub fn divide_evenly(size: usize, divisor: usize, what: &str) -> Result<usize> {
    if divisor == 0 || size % divisor != 0 {
        return Err(Error::Indivisible {
            what: what.to_string(),
            size,
            divisor,
        });
    }
    Ok(size / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_topology() {
        assert!(ShardConfig::new(0, 0).is_err());
        assert!(ShardConfig::new(4, 4).is_err());
        assert!(ShardConfig::new(3, 4).is_ok());
    }

    #[test]
    fn test_partition_even() {
        let shard = ShardConfig { rank: 0, world_size: 4 };
        assert_eq!(
            shard.partition(128),
            Partition { start: 0, end: 32, block: 32 }
        );

        let shard = ShardConfig { rank: 3, world_size: 4 };
        assert_eq!(
            shard.partition(128),
            Partition { start: 96, end: 128, block: 32 }
        );
    }

    #[test]
    fn test_partition_uneven_tail() {
        // 10 over 3 ranks: block 4, last rank owns only 2 real rows
        let p0 = ShardConfig { rank: 0, world_size: 3 }.partition(10);
        let p1 = ShardConfig { rank: 1, world_size: 3 }.partition(10);
        let p2 = ShardConfig { rank: 2, world_size: 3 }.partition(10);
        assert_eq!(p0, Partition { start: 0, end: 4, block: 4 });
        assert_eq!(p1, Partition { start: 4, end: 8, block: 4 });
        assert_eq!(p2, Partition { start: 8, end: 10, block: 4 });
        assert_eq!(p2.len(), 2);
    }

    #[test]
    fn test_partition_disjoint_cover() {
        for (total, world_size) in [(1usize, 1usize), (7, 2), (16, 4), (10, 3), (5, 8)] {
            let mut covered = 0;
            for rank in 0..world_size {
                let p = ShardConfig { rank, world_size }.partition(total);
                assert_eq!(p.start, covered, "ranges must be contiguous");
                assert!(p.len() <= p.block);
                covered = p.end;
            }
            assert_eq!(covered, total, "ranges must cover [0, total)");
        }
    }

    #[test]
    fn test_partition_empty_rank() {
        // 5 over 8 ranks: block 1, ranks 5..8 own nothing
        let p = ShardConfig { rank: 7, world_size: 8 }.partition(5);
        assert!(p.is_empty());
        assert_eq!(p.block, 1);
    }

    #[test]
    fn test_divide_evenly() {
        assert_eq!(divide_evenly(12, 4, "rows").unwrap(), 3);
        let err = divide_evenly(10, 4, "rows").unwrap_err();
        assert_eq!(
            err.to_string(),
            "rows (10) is not evenly divisible by 4"
        );
    }
}
