//! Range planning: partitions `[0, total_size)` into contiguous byte ranges.

use tracing::debug;

use super::constants::{MAX_RANGE_BYTES, MIN_RANGE_BYTES};

/// One inclusive byte range of a resource, identified by its position in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Ordinal in the plan, starting at 0.
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a planned range covers at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the HTTP `Range` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Bounds on the size of a planned range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimits {
    /// Smallest block the planner will produce; resources under twice this size
    /// are fetched as a single range.
    pub min_range_bytes: u64,
    /// Largest block the planner will produce (the final range may exceed it by
    /// less than one block when absorbing the remainder).
    pub max_range_bytes: u64,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            min_range_bytes: MIN_RANGE_BYTES,
            max_range_bytes: MAX_RANGE_BYTES,
        }
    }
}

/// Splits a resource of `total_size` bytes into ranges for `worker_count` workers.
///
/// The block size is `total_size / worker_count` clamped to `limits`; the
/// resource is cut into whole blocks and the last range absorbs the remainder.
/// The result is contiguous, ordered by index, and covers every byte exactly once.
/// A zero-length resource yields an empty plan.
#[must_use]
pub fn plan_ranges(total_size: u64, worker_count: usize, limits: RangeLimits) -> Vec<ByteRange> {
    if total_size == 0 {
        return Vec::new();
    }

    let min = limits.min_range_bytes.max(1);
    let max = limits.max_range_bytes.max(min);

    if total_size < min.saturating_mul(2) {
        return vec![ByteRange {
            index: 0,
            start: 0,
            end: total_size - 1,
        }];
    }

    let workers = u64::try_from(worker_count.max(1)).unwrap_or(u64::MAX);
    let block_size = (total_size / workers).clamp(min, max);
    let count = (total_size / block_size).max(1);

    let mut ranges = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    let mut start = 0;
    for i in 0..count {
        let end = if i + 1 == count {
            total_size - 1
        } else {
            start + block_size - 1
        };
        ranges.push(ByteRange {
            index: ranges.len(),
            start,
            end,
        });
        start = end + 1;
    }

    debug!(
        total_size,
        worker_count,
        block_size,
        ranges = ranges.len(),
        "planned download ranges"
    );
    ranges
}
