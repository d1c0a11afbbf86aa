//! Signed delta coding over `u64` storage
//!
//! Deltas use wrapping arithmetic so that any sequence, including values at
//! the `i64`/`u64` boundaries, survives the round trip.

pub fn encode(input: &[u64]) -> Vec<u64> {
    let mut prev = 0u64;
    input
        .iter()
        .map(|&v| {
            let delta = v.wrapping_sub(prev);
            prev = v;
            delta
        })
        .collect()
}

pub fn decode(input: &[u64]) -> Vec<u64> {
    let mut acc = 0u64;
    input
        .iter()
        .map(|&d| {
            acc = acc.wrapping_add(d);
            acc
        })
        .collect()
}
