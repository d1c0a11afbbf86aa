//! In-memory descriptor sub-sequences of one access unit
//!
//! ```text
//!  (POS,0)   [100, 5, 100, 0]        cursor ──► 2
//!  (RLEN,0)  [9, 9, 9, 9]            cursor ──► 2
//!  (RTYPE,0) [1, 1, 1, 1]            cursor ──► 2
//! ```
//!
//! The encoder only appends. The decoder consumes each sub-sequence through
//! its own cursor, in exactly the order the values were produced, and many
//! optional fields are detected by looking at what remains in a sub-sequence.

use std::collections::BTreeMap;

use crate::error::{Result, StreamError};

use super::SubSeq;

/// Values of one sub-sequence plus the decoder cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubSequence {
    values: Vec<u64>,
    /// Side channel written next to some values (e.g. the reference base of a
    /// substitution); never read back by the decoder
    dependencies: Vec<u64>,
    cursor: usize,
}
impl SubSequence {
    #[must_use]
    pub fn from_values(values: Vec<u64>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    #[must_use]
    pub fn dependencies(&self) -> &[u64] {
        &self.dependencies
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len() - self.cursor
    }
}

/// Descriptor sub-sequences keyed by (descriptor, sub-sequence)
///
/// Keys are created on first push. Iteration follows the descriptor table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorStreamSet {
    streams: BTreeMap<SubSeq, SubSequence>,
}
impl DescriptorStreamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subseq: SubSeq, value: u64) {
        self.streams.entry(subseq).or_default().values.push(value);
    }

    /// Pushes a value together with its dependency side-channel value
    pub fn push_with_dependency(&mut self, subseq: SubSeq, value: u64, dependency: u64) {
        let stream = self.streams.entry(subseq).or_default();
        stream.values.push(value);
        stream.dependencies.push(dependency);
    }

    /// Replaces a full sub-sequence (used when loading payloads)
    pub fn insert(&mut self, subseq: SubSeq, values: Vec<u64>) {
        self.streams.insert(subseq, SubSequence::from_values(values));
    }

    /// Consumes the next value of a sub-sequence
    pub fn pop(&mut self, subseq: SubSeq) -> Result<u64> {
        let stream = self.streams.entry(subseq).or_default();
        match stream.values.get(stream.cursor) {
            Some(&value) => {
                stream.cursor += 1;
                Ok(value)
            }
            None => Err(StreamError::StreamExhausted {
                subseq,
                consumed: stream.cursor,
            }
            .into()),
        }
    }

    /// Fails unless at least `count` values are left to consume
    pub fn ensure_remaining(&self, subseq: SubSeq, count: u64) -> Result<()> {
        let remaining = self.remaining(subseq);
        if usize::try_from(count).is_ok_and(|count| count <= remaining) {
            return Ok(());
        }
        Err(StreamError::StreamExhausted {
            subseq,
            consumed: self.size(subseq) - remaining,
        }
        .into())
    }

    /// Consumes the next value and interprets it as a boolean flag
    pub fn pop_flag(&mut self, subseq: SubSeq) -> Result<bool> {
        self.pop(subseq).map(|v| v != 0)
    }

    /// Next value without consuming it
    #[must_use]
    pub fn peek(&self, subseq: SubSeq) -> Option<u64> {
        self.peek_at(subseq, 0)
    }

    /// Value `offset` positions past the cursor without consuming anything
    #[must_use]
    pub fn peek_at(&self, subseq: SubSeq, offset: usize) -> Option<u64> {
        self.streams
            .get(&subseq)
            .and_then(|s| s.values.get(s.cursor + offset).copied())
    }

    /// Total number of values pushed
    #[must_use]
    pub fn size(&self, subseq: SubSeq) -> usize {
        self.streams.get(&subseq).map_or(0, SubSequence::len)
    }

    /// Number of values not yet consumed
    #[must_use]
    pub fn remaining(&self, subseq: SubSeq) -> usize {
        self.streams.get(&subseq).map_or(0, SubSequence::remaining)
    }

    #[must_use]
    pub fn values(&self, subseq: SubSeq) -> &[u64] {
        self.streams.get(&subseq).map_or(&[], SubSequence::values)
    }

    #[must_use]
    pub fn dependencies(&self, subseq: SubSeq) -> &[u64] {
        self.streams.get(&subseq).map_or(&[], SubSequence::dependencies)
    }

    /// Resets every cursor to the start
    pub fn rewind(&mut self) {
        self.streams.values_mut().for_each(|s| s.cursor = 0);
    }

    /// Fails on the first sub-sequence that still holds unconsumed values
    pub fn ensure_consumed(&self) -> Result<()> {
        match self.streams.iter().find(|(_, s)| s.remaining() > 0) {
            Some((subseq, stream)) => Err(StreamError::UnconsumedValues {
                subseq: *subseq,
                remaining: stream.remaining(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Non-empty sub-sequences in descriptor-table order
    pub fn iter(&self) -> impl Iterator<Item = (SubSeq, &SubSequence)> {
        self.streams
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(k, s)| (*k, s))
    }

    /// Total number of values across all sub-sequences
    #[must_use]
    pub fn total_values(&self) -> usize {
        self.streams.values().map(SubSequence::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_values() == 0
    }

    /// Compares values only, ignoring cursors and dependency side channels
    #[must_use]
    pub fn same_values(&self, other: &Self) -> bool {
        self.iter()
            .map(|(k, s)| (k, s.values()))
            .eq(other.iter().map(|(k, s)| (k, s.values())))
    }
}
