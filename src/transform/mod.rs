//! Reversible transforms over integer sub-sequences
//!
//! Every transform turns one sequence of `u64` into a fixed number of output
//! streams and back. They know nothing about genomics and can be applied to
//! any descriptor sub-sequence before the byte-level entropy stage.
//!
//! | transform  | streams                          |
//! |------------|----------------------------------|
//! | `None`     | values                           |
//! | `Equality` | flags, raw values                |
//! | `Match`    | raw values, pointers, lengths    |
//! | `Rle`      | values, lengths                  |
//! | `Diff`     | deltas                           |
//! | `Lut`      | ranks, table                     |

pub mod diff;
pub mod equality;
pub mod lut;
pub mod matching;
pub mod rle;

use crate::error::{Result, StreamError, TransformError};

/// Transform applied to a sub-sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubSeqTransform {
    #[default]
    None,
    Equality,
    Match {
        window: u64,
    },
    Rle {
        guard: u64,
    },
    Diff,
    Lut,
}
impl SubSeqTransform {
    /// Number of streams `forward` produces
    #[must_use]
    pub fn num_streams(self) -> usize {
        match self {
            Self::None | Self::Diff => 1,
            Self::Equality | Self::Rle { .. } | Self::Lut => 2,
            Self::Match { .. } => 3,
        }
    }

    pub fn forward(self, input: &[u64]) -> Result<Vec<Vec<u64>>> {
        let streams = match self {
            Self::None => vec![input.to_vec()],
            Self::Equality => {
                let s = equality::encode(input);
                vec![s.flags, s.raw_values]
            }
            Self::Match { window } => {
                let window = usize::try_from(window).unwrap_or(usize::MAX);
                let s = matching::encode(input, window);
                vec![s.raw_values, s.pointers, s.lengths]
            }
            Self::Rle { guard } => {
                let s = rle::encode(input, guard)?;
                vec![s.values, s.lengths]
            }
            Self::Diff => vec![diff::encode(input)],
            Self::Lut => {
                let s = lut::encode(input);
                vec![s.ranks, s.table]
            }
        };
        Ok(streams)
    }

    pub fn inverse(self, streams: &[Vec<u64>]) -> Result<Vec<u64>> {
        if streams.len() != self.num_streams() {
            return Err(TransformError::StreamCount {
                expected: self.num_streams(),
                actual: streams.len(),
            }
            .into());
        }
        match self {
            Self::None => Ok(streams[0].clone()),
            Self::Equality => equality::decode(&streams[0], &streams[1]),
            Self::Match { .. } => matching::decode(&streams[0], &streams[1], &streams[2]),
            Self::Rle { guard } => rle::decode(&streams[0], &streams[1], guard),
            Self::Diff => Ok(diff::decode(&streams[0])),
            Self::Lut => lut::decode(&streams[0], &streams[1]),
        }
    }

    /// Serialized (tag, parameter) pair
    #[must_use]
    pub fn tag(self) -> (u8, u64) {
        match self {
            Self::None => (0, 0),
            Self::Equality => (1, 0),
            Self::Match { window } => (2, window),
            Self::Rle { guard } => (3, guard),
            Self::Diff => (4, 0),
            Self::Lut => (5, 0),
        }
    }

    pub fn from_tag(tag: u8, param: u64) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Equality),
            2 => Ok(Self::Match { window: param }),
            3 => Ok(Self::Rle { guard: param }),
            4 => Ok(Self::Diff),
            5 => Ok(Self::Lut),
            _ => Err(StreamError::UnknownTransform(tag).into()),
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    const ALL: [SubSeqTransform; 6] = [
        SubSeqTransform::None,
        SubSeqTransform::Equality,
        SubSeqTransform::Match { window: 32 },
        SubSeqTransform::Rle { guard: 3 },
        SubSeqTransform::Diff,
        SubSeqTransform::Lut,
    ];

    #[test]
    fn test_dispatch_round_trip() -> crate::Result<()> {
        let input = vec![9, 9, 9, 1, 2, 3, 1, 2, 3, 1, 2, 3, 0, u64::MAX];
        for transform in ALL {
            let streams = transform.forward(&input)?;
            assert_eq!(streams.len(), transform.num_streams());
            assert_eq!(transform.inverse(&streams)?, input);

            let (tag, param) = transform.tag();
            assert_eq!(SubSeqTransform::from_tag(tag, param)?, transform);
        }
        Ok(())
    }

    #[test]
    fn test_wrong_stream_count() {
        let err = SubSeqTransform::Match { window: 4 }
            .inverse(&[vec![1], vec![]])
            .unwrap_err();
        assert!(err.is_inconsistent_transform());
    }
}
