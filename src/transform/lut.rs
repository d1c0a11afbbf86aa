//! Order-0 lookup-table coding
//!
//! Symbols are replaced by their frequency rank (most frequent first, ties
//! broken by the smaller symbol). The table maps ranks back to symbols.

use std::collections::HashMap;

use crate::error::{Result, TransformError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LutStreams {
    pub ranks: Vec<u64>,
    pub table: Vec<u64>,
}

pub fn encode(input: &[u64]) -> LutStreams {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &v in input {
        *counts.entry(v).or_default() += 1;
    }

    let mut table: Vec<(u64, usize)> = counts.into_iter().collect();
    table.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let rank_of: HashMap<u64, u64> = table
        .iter()
        .enumerate()
        .map(|(rank, (sym, _))| (*sym, rank as u64))
        .collect();

    LutStreams {
        ranks: input.iter().map(|v| rank_of[v]).collect(),
        table: table.into_iter().map(|(sym, _)| sym).collect(),
    }
}

pub fn decode(ranks: &[u64], table: &[u64]) -> Result<Vec<u64>> {
    ranks
        .iter()
        .map(|&rank| {
            usize::try_from(rank)
                .ok()
                .and_then(|r| table.get(r).copied())
                .ok_or_else(|| {
                    TransformError::LutRankOutOfRange {
                        rank,
                        size: table.len(),
                    }
                    .into()
                })
        })
        .collect()
}
