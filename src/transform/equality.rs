//! Equality coding: one flag per value telling whether it repeats the previous
//! value (initially 0); other values go to a raw stream, decremented when
//! greater than the previous value.

use crate::error::{Result, TransformError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EqualityStreams {
    pub flags: Vec<u64>,
    pub raw_values: Vec<u64>,
}

pub fn encode(input: &[u64]) -> EqualityStreams {
    let mut out = EqualityStreams::default();
    let mut prev = 0u64;
    for &value in input {
        if value == prev {
            out.flags.push(1);
        } else {
            out.flags.push(0);
            out.raw_values
                .push(if value > prev { value - 1 } else { value });
        }
        prev = value;
    }
    out
}

pub fn decode(flags: &[u64], raw_values: &[u64]) -> Result<Vec<u64>> {
    let mut output = Vec::with_capacity(flags.len());
    let mut raw = raw_values.iter();
    let mut prev = 0u64;
    for &flag in flags {
        if flag == 0 {
            let &r = raw
                .next()
                .ok_or(TransformError::RawValuesExhausted(output.len()))?;
            prev = if r >= prev {
                r.checked_add(1).ok_or(TransformError::LengthOverflow(r))?
            } else {
                r
            };
        }
        output.push(prev);
    }
    if raw.len() > 0 {
        return Err(TransformError::TrailingValues {
            stream: "raw values",
            remaining: raw.len(),
        }
        .into());
    }
    Ok(output)
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_round_trip() -> crate::Result<()> {
        let input = [0, 0, 3, 3, 3, 1, u64::MAX, u64::MAX, 0, 2];
        let streams = encode(&input);
        assert_eq!(streams.flags, vec![1, 1, 0, 1, 1, 0, 0, 1, 0, 0]);
        assert_eq!(streams.raw_values, vec![2, 1, u64::MAX - 1, 0, 1]);
        assert_eq!(decode(&streams.flags, &streams.raw_values)?, input);
        Ok(())
    }

    #[test]
    fn test_missing_raw_value() {
        assert!(decode(&[0], &[]).unwrap_err().is_inconsistent_transform());
        assert!(decode(&[1], &[4]).unwrap_err().is_inconsistent_transform());
    }
}
