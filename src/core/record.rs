use crate::error::{Result, StreamError};

use super::{
    DescriptorStreamSet, PAIR_CASE, PAIR_R1_DIFF_POS, PAIR_R1_DIFF_SEQ, PAIR_R1_SPLIT,
    PAIR_R2_DIFF_POS, PAIR_R2_DIFF_SEQ, PAIR_R2_SPLIT, PAIR_SAME_REC,
};

/// Alignment class of an access unit
///
/// Classes are ordered: a block takes the highest class any of its records needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ClassId {
    /// Perfect matches
    #[default]
    P = 1,
    /// Mismatches are N only
    N = 2,
    /// Substitutions
    M = 3,
    /// Insertions, deletions or clips
    I = 4,
    /// Half mapped: one aligned segment, one unmapped mate
    HM = 5,
    /// Unmapped
    U = 6,
}
impl ClassId {
    pub fn from_u8(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::P),
            2 => Ok(Self::N),
            3 => Ok(Self::M),
            4 => Ok(Self::I),
            5 => Ok(Self::HM),
            6 => Ok(Self::U),
            _ => Err(StreamError::InvalidClassId(id).into()),
        }
    }

    /// Classes whose records may carry clips and splices
    #[must_use]
    pub fn has_clips(self) -> bool {
        matches!(self, Self::I | Self::HM)
    }
}

/// Clip on one side of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Clip {
    #[default]
    None,
    /// Bases kept in the read but outside of the alignment
    Soft(u64),
    /// Bases removed from the read
    Hard(u64),
}
impl Clip {
    #[must_use]
    pub fn soft_len(self) -> u64 {
        match self {
            Self::Soft(n) => n,
            _ => 0,
        }
    }

    #[must_use]
    pub fn hard_len(self) -> u64 {
        match self {
            Self::Hard(n) => n,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Clips of a segment in reference-forward orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Clips {
    pub left: Clip,
    pub right: Clip,
}
impl Clips {
    #[must_use]
    pub fn new(left: Clip, right: Clip) -> Self {
        Self { left, right }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    #[must_use]
    pub fn soft_len(&self) -> u64 {
        self.left.soft_len() + self.right.soft_len()
    }

    #[must_use]
    pub fn hard_len(&self) -> u64 {
        self.left.hard_len().saturating_add(self.right.hard_len())
    }
}

/// Kind of a noise event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseKind {
    /// Read base differs from the reference base
    Substitution { base: u8, reference: u8 },
    /// Base present in the read only
    Insertion(u8),
    /// Reference base missing from the read
    Deletion,
}
impl NoiseKind {
    #[must_use]
    pub fn type_id(self) -> u64 {
        match self {
            Self::Substitution { .. } => 0,
            Self::Insertion(_) => 1,
            Self::Deletion => 2,
        }
    }
}

/// One noise event of an aligned segment
///
/// `column` counts alignment columns from the first aligned base: every
/// matched or substituted base, inserted base and deleted reference base
/// occupies one column. Soft clips are not columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Noise {
    pub column: u64,
    pub kind: NoiseKind,
}
impl Noise {
    #[must_use]
    pub fn substitution(column: u64, base: u8, reference: u8) -> Self {
        Self {
            column,
            kind: NoiseKind::Substitution { base, reference },
        }
    }

    #[must_use]
    pub fn insertion(column: u64, base: u8) -> Self {
        Self {
            column,
            kind: NoiseKind::Insertion(base),
        }
    }

    #[must_use]
    pub fn deletion(column: u64) -> Self {
        Self {
            column,
            kind: NoiseKind::Deletion,
        }
    }
}

/// How the mate of a paired record is located
///
/// The discriminant written to `PAIR[0]` is the variant's position in this
/// enum; `Unpaired` uses 5 (read 1) and 6 (read 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingCase {
    /// Both segments live in this record; `delta` is the mate position offset
    SameRecord { read1_first: bool, delta: u64 },
    /// This record holds read 1, read 2 is another record of the same block
    R1Split { mate_record: u64 },
    /// This record holds read 2, read 1 is another record of the same block
    R2Split { mate_record: u64 },
    /// This record holds read 1, read 2 lives in another block
    R1DiffBlock { mate_block: u64, mate_record: u64 },
    /// This record holds read 2, read 1 lives in another block
    R2DiffBlock { mate_block: u64, mate_record: u64 },
    /// The mate is absent
    Unpaired { read1_first: bool },
}
impl PairingCase {
    #[must_use]
    pub fn discriminant(&self) -> u64 {
        match self {
            Self::SameRecord { .. } => 0,
            Self::R1Split { .. } => 1,
            Self::R2Split { .. } => 2,
            Self::R1DiffBlock { .. } => 3,
            Self::R2DiffBlock { .. } => 4,
            Self::Unpaired { read1_first: true } => 5,
            Self::Unpaired { read1_first: false } => 6,
        }
    }

    /// Classifies a record from the block and record coordinates of both mates
    ///
    /// `current_is_read1` tells which file of the pair the record's read came from.
    #[must_use]
    pub fn classify(
        current: (u64, u64),
        mate: (u64, u64),
        current_is_read1: bool,
        delta: u64,
    ) -> Self {
        let (mate_block, mate_record) = mate;
        if current == mate {
            Self::SameRecord {
                read1_first: current_is_read1,
                delta,
            }
        } else if current.0 == mate_block {
            if current_is_read1 {
                Self::R1Split { mate_record }
            } else {
                Self::R2Split { mate_record }
            }
        } else if current_is_read1 {
            Self::R1DiffBlock {
                mate_block,
                mate_record,
            }
        } else {
            Self::R2DiffBlock {
                mate_block,
                mate_record,
            }
        }
    }

    /// Block and record of the mate given the coordinates of this record
    #[must_use]
    pub fn mate_location(&self, block: u64, record: u64) -> Option<(u64, u64)> {
        match *self {
            Self::SameRecord { .. } => Some((block, record)),
            Self::R1Split { mate_record } | Self::R2Split { mate_record } => {
                Some((block, mate_record))
            }
            Self::R1DiffBlock {
                mate_block,
                mate_record,
            }
            | Self::R2DiffBlock {
                mate_block,
                mate_record,
            } => Some((mate_block, mate_record)),
            Self::Unpaired { .. } => None,
        }
    }

    /// Writes the case and its payload
    pub fn push(&self, streams: &mut DescriptorStreamSet) {
        streams.push(PAIR_CASE, self.discriminant());
        match *self {
            Self::SameRecord { read1_first, delta } => {
                streams.push(PAIR_SAME_REC, u64::from(!read1_first) | (delta << 1));
            }
            Self::R1Split { mate_record } => streams.push(PAIR_R1_SPLIT, mate_record),
            Self::R2Split { mate_record } => streams.push(PAIR_R2_SPLIT, mate_record),
            Self::R1DiffBlock {
                mate_block,
                mate_record,
            } => {
                streams.push(PAIR_R1_DIFF_SEQ, mate_block);
                streams.push(PAIR_R1_DIFF_POS, mate_record);
            }
            Self::R2DiffBlock {
                mate_block,
                mate_record,
            } => {
                streams.push(PAIR_R2_DIFF_SEQ, mate_block);
                streams.push(PAIR_R2_DIFF_POS, mate_record);
            }
            Self::Unpaired { .. } => {}
        }
    }

    /// Reads a case and its payload
    pub fn pop(streams: &mut DescriptorStreamSet) -> Result<Self> {
        let case = match streams.pop(PAIR_CASE)? {
            0 => {
                let packed = streams.pop(PAIR_SAME_REC)?;
                Self::SameRecord {
                    read1_first: packed & 1 == 0,
                    delta: packed >> 1,
                }
            }
            1 => Self::R1Split {
                mate_record: streams.pop(PAIR_R1_SPLIT)?,
            },
            2 => Self::R2Split {
                mate_record: streams.pop(PAIR_R2_SPLIT)?,
            },
            3 => Self::R1DiffBlock {
                mate_block: streams.pop(PAIR_R1_DIFF_SEQ)?,
                mate_record: streams.pop(PAIR_R1_DIFF_POS)?,
            },
            4 => Self::R2DiffBlock {
                mate_block: streams.pop(PAIR_R2_DIFF_SEQ)?,
                mate_record: streams.pop(PAIR_R2_DIFF_POS)?,
            },
            5 => Self::Unpaired { read1_first: true },
            6 => Self::Unpaired { read1_first: false },
            other => return Err(StreamError::UnknownPairingCase(other).into()),
        };
        Ok(case)
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_class_order() -> crate::Result<()> {
        assert!(ClassId::P < ClassId::M);
        assert!(ClassId::M < ClassId::I);
        assert_eq!(ClassId::from_u8(5)?, ClassId::HM);
        assert!(ClassId::from_u8(0).is_err());
        Ok(())
    }

    #[test]
    fn test_pairing_cases_are_exhaustive() -> crate::Result<()> {
        // (current block, record), (mate block, record), read1?
        let scenarios = [
            ((0, 3), (0, 3), true, 0),
            ((0, 3), (0, 7), true, 1),
            ((0, 7), (0, 3), false, 2),
            ((1, 0), (4, 9), true, 3),
            ((4, 9), (1, 0), false, 4),
        ];
        for (current, mate, is_read1, expected) in scenarios {
            let case = PairingCase::classify(current, mate, is_read1, 12);
            assert_eq!(case.discriminant(), expected);

            let mut streams = DescriptorStreamSet::new();
            case.push(&mut streams);
            let decoded = PairingCase::pop(&mut streams)?;
            assert_eq!(decoded, case);
            assert_eq!(decoded.mate_location(current.0, current.1), Some(mate));
            streams.ensure_consumed()?;
        }
        Ok(())
    }

    #[test]
    fn test_same_record_packing() -> crate::Result<()> {
        let mut streams = DescriptorStreamSet::new();
        PairingCase::SameRecord {
            read1_first: false,
            delta: 250,
        }
        .push(&mut streams);
        assert_eq!(streams.values(PAIR_SAME_REC), &[501]);
        assert_eq!(
            PairingCase::pop(&mut streams)?,
            PairingCase::SameRecord {
                read1_first: false,
                delta: 250
            }
        );
        Ok(())
    }

    #[test]
    fn test_unknown_case() {
        let mut streams = DescriptorStreamSet::new();
        streams.push(PAIR_CASE, 9);
        assert!(PairingCase::pop(&mut streams).is_err());
    }
}
