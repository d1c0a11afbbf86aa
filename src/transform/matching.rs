//! LZ-style match coding within a bounded window
//!
//! The input is walked left to right. At each position the longest earlier
//! repeat of at least [`MIN_MATCH_LEN`] values starting at most `window`
//! positions back is looked up. Every step writes one entry to `lengths`:
//! `0` for a literal (copied to `raw_values`) or the match length, in which
//! case the distance goes to `pointers`.
//!
//! ```text
//!  input     [-1  2 -3  4 | 2 -3  4 | -1]       window 4
//!  lengths   [ 0  0  0  0 |    3    |  0]
//!  pointers  [              3             ]
//!  raw       [-1  2 -3  4 |         | -1]
//! ```
//!
//! Matches may overlap the position being encoded. Among equally long
//! candidates the nearest one wins.

use std::collections::HashMap;

use crate::error::{Result, TransformError};

/// Shorter repeats cost more than the literals they replace
pub const MIN_MATCH_LEN: usize = 3;

const NO_POSITION: usize = usize::MAX;

/// Streams produced by match coding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStreams {
    pub raw_values: Vec<u64>,
    pub pointers: Vec<u64>,
    pub lengths: Vec<u64>,
}

/// Hash chains over 3-grams, most recent position first
struct CandidateIndex {
    heads: HashMap<[u64; MIN_MATCH_LEN], usize>,
    previous: Vec<usize>,
}
impl CandidateIndex {
    fn new(capacity: usize) -> Self {
        Self {
            heads: HashMap::new(),
            previous: vec![NO_POSITION; capacity],
        }
    }

    fn key(input: &[u64], pos: usize) -> Option<[u64; MIN_MATCH_LEN]> {
        input
            .get(pos..pos + MIN_MATCH_LEN)
            .map(|s| [s[0], s[1], s[2]])
    }

    fn insert(&mut self, input: &[u64], pos: usize) {
        if let Some(key) = Self::key(input, pos) {
            let prev = self.heads.insert(key, pos).unwrap_or(NO_POSITION);
            self.previous[pos] = prev;
        }
    }

    /// Longest match for `pos`, returns (distance, length)
    fn longest(&self, input: &[u64], pos: usize, window: usize) -> Option<(usize, usize)> {
        let key = Self::key(input, pos)?;
        let mut candidate = self.heads.get(&key).copied().unwrap_or(NO_POSITION);
        let mut best: Option<(usize, usize)> = None;
        while candidate != NO_POSITION && pos - candidate <= window {
            let len = input[pos..]
                .iter()
                .zip(&input[candidate..])
                .take_while(|(a, b)| a == b)
                .count();
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((pos - candidate, len));
            }
            candidate = self.previous[candidate];
        }
        best.filter(|&(_, len)| len >= MIN_MATCH_LEN)
    }
}

pub fn encode(input: &[u64], window: usize) -> MatchStreams {
    let mut out = MatchStreams::default();
    if window <= 1 {
        out.raw_values.extend_from_slice(input);
        out.lengths.resize(input.len(), 0);
        return out;
    }

    let mut index = CandidateIndex::new(input.len());
    let mut pos = 0;
    while pos < input.len() {
        match index.longest(input, pos, window) {
            Some((distance, len)) => {
                out.pointers.push(distance as u64);
                out.lengths.push(len as u64);
                for p in pos..pos + len {
                    index.insert(input, p);
                }
                pos += len;
            }
            None => {
                out.raw_values.push(input[pos]);
                out.lengths.push(0);
                index.insert(input, pos);
                pos += 1;
            }
        }
    }
    out
}

pub fn decode(raw_values: &[u64], pointers: &[u64], lengths: &[u64]) -> Result<Vec<u64>> {
    let mut output: Vec<u64> = Vec::with_capacity(raw_values.len());
    let mut raw = raw_values.iter();
    let mut ptrs = pointers.iter();

    for &len in lengths {
        if len == 0 {
            let &value = raw
                .next()
                .ok_or(TransformError::RawValuesExhausted(output.len()))?;
            output.push(value);
            continue;
        }

        let &pointer = ptrs
            .next()
            .ok_or(TransformError::PointersExhausted(output.len()))?;
        let distance = usize::try_from(pointer)
            .ok()
            .filter(|&d| d > 0 && d <= output.len())
            .ok_or(TransformError::InvalidPointer {
                pointer,
                available: output.len(),
            })?;
        let len = usize::try_from(len).map_err(|_| TransformError::LengthOverflow(len))?;
        let start = output.len() - distance;
        // element-wise so overlapping matches replicate the pattern
        for offset in 0..len {
            let value = output[start + offset];
            output.push(value);
        }
    }

    if raw.len() > 0 {
        return Err(TransformError::TrailingValues {
            stream: "raw values",
            remaining: raw.len(),
        }
        .into());
    }
    if ptrs.len() > 0 {
        return Err(TransformError::TrailingValues {
            stream: "pointers",
            remaining: ptrs.len(),
        }
        .into());
    }
    Ok(output)
}

#[cfg(test)]
mod testing {
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::*;

    fn signed(values: &[i64]) -> Vec<u64> {
        values.iter().map(|&v| v as u64).collect()
    }

    #[test]
    fn test_fixed_example() -> crate::Result<()> {
        let input = signed(&[-1, 2, -3, 4, 2, -3, 4, -1]);
        let streams = encode(&input, 4);
        assert_eq!(streams.pointers, vec![3]);
        assert_eq!(streams.lengths, vec![0, 0, 0, 0, 3, 0]);
        assert_eq!(streams.raw_values, signed(&[-1, 2, -3, 4, -1]));
        assert_eq!(
            decode(&streams.raw_values, &streams.pointers, &streams.lengths)?,
            input
        );
        Ok(())
    }

    #[test]
    fn test_degenerate_window() -> crate::Result<()> {
        let input = vec![1, 1, 1, 1, 1, 1];
        for window in [0, 1] {
            let streams = encode(&input, window);
            assert!(streams.pointers.is_empty());
            assert_eq!(streams.raw_values, input);
            assert_eq!(streams.lengths.len(), streams.raw_values.len());
            assert!(streams.lengths.iter().all(|&l| l == 0));
            assert_eq!(
                decode(&streams.raw_values, &streams.pointers, &streams.lengths)?,
                input
            );
        }
        let streams = encode(&[], 0);
        assert!(streams.raw_values.is_empty() && streams.lengths.is_empty());
        Ok(())
    }

    #[test]
    fn test_overlapping_match() -> crate::Result<()> {
        let input = vec![5u64; 10];
        let streams = encode(&input, 16);
        assert_eq!(streams.raw_values, vec![5]);
        assert_eq!(streams.pointers, vec![1]);
        assert_eq!(streams.lengths, vec![0, 9]);
        assert_eq!(
            decode(&streams.raw_values, &streams.pointers, &streams.lengths)?,
            input
        );
        Ok(())
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let input = vec![1, 2, 3, 9, 1, 2, 3, 8, 1, 2, 3];
        let streams = encode(&input, 64);
        assert_eq!(streams.pointers, vec![4, 4]);
    }

    #[test]
    fn test_window_bounds_distance() {
        let input = vec![1, 2, 3, 0, 0, 1, 2, 3];
        assert!(encode(&input, 4).pointers.is_empty());
        assert_eq!(encode(&input, 5).pointers, vec![5]);
    }

    #[test]
    fn test_random_round_trip() -> crate::Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for word_bytes in [1u32, 2, 4] {
            let max = 1u64 << (8 * word_bytes);
            let input: Vec<u64> = (0..10 * 1024)
                .map(|_| rng.random_range(0..max.min(4)))
                .collect();
            let streams = encode(&input, 1024);
            assert_eq!(
                decode(&streams.raw_values, &streams.pointers, &streams.lengths)?,
                input
            );

            let wide: Vec<u64> = (0..10 * 1024).map(|_| rng.random_range(0..max)).collect();
            let streams = encode(&wide, 1024);
            assert_eq!(
                decode(&streams.raw_values, &streams.pointers, &streams.lengths)?,
                wide
            );
        }
        Ok(())
    }

    #[test]
    fn test_malformed_streams() {
        // lengths ask for literals that are not there
        let err = decode(&[], &[], &[0, 0]).unwrap_err();
        assert!(err.is_inconsistent_transform());

        // pointers without any lengths
        let err = decode(&[], &[3], &[]).unwrap_err();
        assert!(err.is_inconsistent_transform());

        // match before any output
        let err = decode(&[], &[1], &[3]).unwrap_err();
        assert!(err.is_inconsistent_transform());

        // pointer of zero
        let err = decode(&[4], &[0], &[0, 3]).unwrap_err();
        assert!(err.is_inconsistent_transform());

        // raw values never referenced
        let err = decode(&[4, 5], &[], &[0]).unwrap_err();
        assert!(err.is_inconsistent_transform());
    }
}
