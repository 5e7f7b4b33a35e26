//! Ordered reassembly of chunks that complete out of order.

use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

use super::fetcher::Chunk;

/// A chunk the buffer refused to accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    /// The index is already waiting in the buffer.
    #[error("chunk {index} was submitted twice")]
    Duplicate {
        /// Offending index.
        index: usize,
    },

    /// The index was emitted earlier.
    #[error("chunk {index} was already released (next expected is {next_expected})")]
    AlreadyReleased {
        /// Offending index.
        index: usize,
        /// Index the buffer is waiting for.
        next_expected: usize,
    },
}

/// Holds completed chunks until every lower index has been released.
///
/// Chunks go in in any order and come out strictly by ascending index with
/// no gaps.
///
/// ```
/// use bytes::Bytes;
/// use rangefetch_core::download::{Chunk, ReorderBuffer};
///
/// let mut buffer = ReorderBuffer::new();
/// buffer.submit(Chunk { index: 1, payload: Bytes::from_static(b"world") }).unwrap();
/// assert!(buffer.drain().is_empty());
///
/// buffer.submit(Chunk { index: 0, payload: Bytes::from_static(b"hello ") }).unwrap();
/// assert_eq!(buffer.drain().concat(), b"hello world");
/// assert!(buffer.is_complete(2));
/// ```
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next_expected: usize,
    pending: BTreeMap<usize, Bytes>,
}

impl ReorderBuffer {
    /// Creates an empty buffer waiting for index 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a chunk until it can be released.
    ///
    /// # Errors
    ///
    /// Rejects an index that is already pending or was already released.
    pub fn submit(&mut self, chunk: Chunk) -> Result<(), ReorderError> {
        if chunk.index < self.next_expected {
            return Err(ReorderError::AlreadyReleased {
                index: chunk.index,
                next_expected: self.next_expected,
            });
        }
        if self.pending.contains_key(&chunk.index) {
            return Err(ReorderError::Duplicate { index: chunk.index });
        }
        self.pending.insert(chunk.index, chunk.payload);
        Ok(())
    }

    /// Releases every payload that is now contiguous with what was already released.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut ready = Vec::new();
        while let Some(payload) = self.pending.remove(&self.next_expected) {
            ready.push(payload);
            self.next_expected += 1;
        }
        ready
    }

    /// Submits and drains in one step.
    ///
    /// # Errors
    ///
    /// Same as [`ReorderBuffer::submit`]; nothing is drained on rejection.
    pub fn submit_and_drain(&mut self, chunk: Chunk) -> Result<Vec<Bytes>, ReorderError> {
        self.submit(chunk)?;
        Ok(self.drain())
    }

    /// Index of the next chunk to be released.
    #[must_use]
    pub fn next_expected(&self) -> usize {
        self.next_expected
    }

    /// Number of chunks held back waiting for a lower index.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True once exactly `expected_count` chunks were released and nothing is left.
    #[must_use]
    pub fn is_complete(&self, expected_count: usize) -> bool {
        self.next_expected == expected_count && self.pending.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            payload: Bytes::from(vec![u8::try_from(index).unwrap(); 3]),
        }
    }

    fn expected_output(count: usize) -> Vec<u8> {
        (0..count).flat_map(|i| chunk(i).payload.to_vec()).collect()
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.is_empty() {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for (i, first) in items.iter().enumerate() {
            let mut rest = items.to_vec();
            rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, *first);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_in_order_submission_releases_immediately() {
        let mut buffer = ReorderBuffer::new();
        for i in 0..4 {
            assert_eq!(buffer.submit_and_drain(chunk(i)).unwrap().len(), 1);
        }
        assert!(buffer.is_complete(4));
    }

    #[test]
    fn test_out_of_order_holds_until_gap_filled() {
        let mut buffer = ReorderBuffer::new();
        assert!(buffer.submit_and_drain(chunk(2)).unwrap().is_empty());
        assert!(buffer.submit_and_drain(chunk(1)).unwrap().is_empty());
        assert_eq!(buffer.pending_len(), 2);
        let released = buffer.submit_and_drain(chunk(0)).unwrap();
        assert_eq!(released.len(), 3);
        assert_eq!(buffer.next_expected(), 3);
    }

    #[test]
    fn test_every_permutation_reassembles_identically() {
        let count = 5;
        let items: Vec<usize> = (0..count).collect();
        let all = permutations(&items);
        assert_eq!(all.len(), 120);

        for order in all {
            let mut buffer = ReorderBuffer::new();
            let mut output = Vec::new();
            for index in &order {
                for payload in buffer.submit_and_drain(chunk(*index)).unwrap() {
                    output.extend_from_slice(&payload);
                }
            }
            assert_eq!(output, expected_output(count), "order {order:?}");
            assert!(buffer.is_complete(count));
        }
    }

    #[test]
    fn test_duplicate_pending_index_rejected() {
        let mut buffer = ReorderBuffer::new();
        buffer.submit(chunk(1)).unwrap();
        assert_eq!(
            buffer.submit(chunk(1)),
            Err(ReorderError::Duplicate { index: 1 })
        );
    }

    #[test]
    fn test_released_index_rejected() {
        let mut buffer = ReorderBuffer::new();
        buffer.submit_and_drain(chunk(0)).unwrap();
        assert_eq!(
            buffer.submit(chunk(0)),
            Err(ReorderError::AlreadyReleased {
                index: 0,
                next_expected: 1
            })
        );
    }

    #[test]
    fn test_incomplete_when_gap_remains() {
        let mut buffer = ReorderBuffer::new();
        buffer.submit_and_drain(chunk(0)).unwrap();
        buffer.submit_and_drain(chunk(2)).unwrap();
        assert!(!buffer.is_complete(3));
        assert!(!buffer.is_complete(1));
    }
}
