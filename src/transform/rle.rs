//! Run-length coding with a guard value
//!
//! Each run of identical values stores the value once. Its length `n` is
//! written as `n - 1` split into chunks: `G` while at least `G` remains, then
//! the remainder (which may be 0). A chunk below `G` ends the run.
//!
//! ```text
//!  input   [7 7 7 7 7 | 2 | 9 9 9]     guard 2
//!  values  [7, 2, 9]
//!  lengths [2, 2, 0,  0,  2, 0]
//! ```
//!
//! With `G = u64::MAX` every run takes exactly one chunk.

use crate::error::{ConfigError, Result, TransformError};

/// Run-length streams of a sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLengths {
    pub values: Vec<u64>,
    pub lengths: Vec<u64>,
}

pub fn encode(input: &[u64], guard: u64) -> Result<RunLengths> {
    if guard == 0 {
        return Err(ConfigError::ZeroGuard.into());
    }

    let mut out = RunLengths::default();
    let mut idx = 0;
    while idx < input.len() {
        let value = input[idx];
        let run = input[idx..].iter().take_while(|&&v| v == value).count();
        idx += run;

        out.values.push(value);
        let mut remaining = run as u64 - 1;
        while remaining >= guard {
            out.lengths.push(guard);
            remaining -= guard;
        }
        out.lengths.push(remaining);
    }
    Ok(out)
}

pub fn decode(values: &[u64], lengths: &[u64], guard: u64) -> Result<Vec<u64>> {
    if guard == 0 {
        return Err(ConfigError::ZeroGuard.into());
    }

    let mut output = Vec::new();
    let mut chunks = lengths.iter();
    for (run_idx, &value) in values.iter().enumerate() {
        let mut extra = 0u64;
        loop {
            let &chunk = chunks
                .next()
                .ok_or(TransformError::UnterminatedRun(run_idx))?;
            extra = extra
                .checked_add(chunk)
                .ok_or(TransformError::LengthOverflow(chunk))?;
            if chunk < guard {
                break;
            }
        }
        let run = usize::try_from(extra)
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or(TransformError::LengthOverflow(extra))?;
        output.extend(std::iter::repeat_n(value, run));
    }

    let remaining = chunks.len();
    if remaining > 0 {
        return Err(TransformError::TrailingValues {
            stream: "lengths",
            remaining,
        }
        .into());
    }
    Ok(output)
}

#[cfg(test)]
mod testing {
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::*;

    #[test]
    fn test_documented_layout() -> crate::Result<()> {
        let input = [7, 7, 7, 7, 7, 2, 9, 9, 9];
        let rl = encode(&input, 2)?;
        assert_eq!(rl.values, vec![7, 2, 9]);
        assert_eq!(rl.lengths, vec![2, 2, 0, 0, 2, 0]);
        assert_eq!(decode(&rl.values, &rl.lengths, 2)?, input);
        Ok(())
    }

    #[test]
    fn test_exact_multiples_of_guard() -> crate::Result<()> {
        for guard in 1..6u64 {
            for run in 1..20usize {
                let input = vec![3u64; run];
                let rl = encode(&input, guard)?;
                assert_eq!(rl.values, vec![3]);
                assert!(*rl.lengths.last().unwrap() < guard);
                assert_eq!(decode(&rl.values, &rl.lengths, guard)?, input);
            }
        }
        Ok(())
    }

    #[test]
    fn test_unbounded_guard_one_chunk_per_run() -> crate::Result<()> {
        let input = [1, 1, 1, 4, 4, 1];
        let rl = encode(&input, u64::MAX)?;
        assert_eq!(rl.lengths, vec![2, 1, 0]);
        assert_eq!(decode(&rl.values, &rl.lengths, u64::MAX)?, input);
        Ok(())
    }

    #[test]
    fn test_random_round_trip() -> crate::Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        for guard in [1, 3, 255, u64::MAX] {
            let input: Vec<u64> = (0..2000).map(|_| rng.random_range(0..3)).collect();
            let rl = encode(&input, guard)?;
            assert_eq!(decode(&rl.values, &rl.lengths, guard)?, input);
        }
        Ok(())
    }

    #[test]
    fn test_empty() -> crate::Result<()> {
        let rl = encode(&[], 4)?;
        assert!(rl.values.is_empty() && rl.lengths.is_empty());
        assert!(decode(&[], &[], 4)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_malformed_streams() {
        // value without a terminating chunk
        assert!(decode(&[1], &[4], 4).unwrap_err().is_inconsistent_transform());
        // lengths without values
        assert!(decode(&[], &[0], 4).unwrap_err().is_inconsistent_transform());
        assert!(encode(&[1], 0).unwrap_err().is_unsupported_configuration());
    }
}
