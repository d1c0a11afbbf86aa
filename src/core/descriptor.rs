use std::fmt;

use crate::error::{Result, StreamError};

/// Descriptor identifiers in table order
///
/// The discriminant is the on-wire descriptor id. Iterating [`DescriptorId::ALL`]
/// yields the stable enumeration order used when exporting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DescriptorId {
    Pos = 0,
    Rcomp = 1,
    Flags = 2,
    Mmpos = 3,
    Mmtype = 4,
    Clips = 5,
    Ureads = 6,
    Rlen = 7,
    Pair = 8,
    Mscore = 9,
    Mmap = 10,
    Msar = 11,
    Rtype = 12,
    Rgroup = 13,
    Qv = 14,
    Rname = 15,
    Rftp = 16,
    Rftt = 17,
}
impl DescriptorId {
    pub const ALL: [Self; 18] = [
        Self::Pos,
        Self::Rcomp,
        Self::Flags,
        Self::Mmpos,
        Self::Mmtype,
        Self::Clips,
        Self::Ureads,
        Self::Rlen,
        Self::Pair,
        Self::Mscore,
        Self::Mmap,
        Self::Msar,
        Self::Rtype,
        Self::Rgroup,
        Self::Qv,
        Self::Rname,
        Self::Rftp,
        Self::Rftt,
    ];

    pub fn from_u8(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| {
                StreamError::InvalidSubSeqId {
                    descriptor: id,
                    subseq: 0,
                }
                .into()
            })
    }

    /// Number of sub-sequences defined for this descriptor
    #[must_use]
    pub fn num_subseqs(self) -> u8 {
        match self {
            Self::Rcomp | Self::Ureads | Self::Rlen | Self::Mscore => 1,
            Self::Rtype | Self::Rgroup | Self::Rftp | Self::Rftt => 1,
            Self::Pos | Self::Mmpos | Self::Msar | Self::Rname => 2,
            Self::Flags | Self::Mmtype => 3,
            Self::Clips => 4,
            Self::Mmap => 5,
            Self::Pair | Self::Qv => 8,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pos => "POS",
            Self::Rcomp => "RCOMP",
            Self::Flags => "FLAGS",
            Self::Mmpos => "MMPOS",
            Self::Mmtype => "MMTYPE",
            Self::Clips => "CLIPS",
            Self::Ureads => "UREADS",
            Self::Rlen => "RLEN",
            Self::Pair => "PAIR",
            Self::Mscore => "MSCORE",
            Self::Mmap => "MMAP",
            Self::Msar => "MSAR",
            Self::Rtype => "RTYPE",
            Self::Rgroup => "RGROUP",
            Self::Qv => "QV",
            Self::Rname => "RNAME",
            Self::Rftp => "RFTP",
            Self::Rftt => "RFTT",
        }
    }
}

/// Key of one descriptor sub-sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubSeq {
    pub descriptor: DescriptorId,
    pub index: u8,
}
impl SubSeq {
    #[must_use]
    pub const fn new(descriptor: DescriptorId, index: u8) -> Self {
        Self { descriptor, index }
    }

    /// Builds a key from raw ids, validating both against the descriptor table
    pub fn from_ids(descriptor: u8, index: u8) -> Result<Self> {
        let id = DescriptorId::from_u8(descriptor)?;
        if index >= id.num_subseqs() {
            return Err(StreamError::InvalidSubSeqId {
                descriptor,
                subseq: index,
            }
            .into());
        }
        Ok(Self::new(id, index))
    }
}
impl fmt::Display for SubSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.descriptor.name(), self.index)
    }
}

// Sub-sequences by role
pub const POS_FIRST: SubSeq = SubSeq::new(DescriptorId::Pos, 0);
pub const POS_ADDITIONAL: SubSeq = SubSeq::new(DescriptorId::Pos, 1);
pub const RCOMP: SubSeq = SubSeq::new(DescriptorId::Rcomp, 0);
pub const FLAGS: [SubSeq; 3] = [
    SubSeq::new(DescriptorId::Flags, 0),
    SubSeq::new(DescriptorId::Flags, 1),
    SubSeq::new(DescriptorId::Flags, 2),
];
pub const MMPOS_TERMINATOR: SubSeq = SubSeq::new(DescriptorId::Mmpos, 0);
pub const MMPOS_POSITION: SubSeq = SubSeq::new(DescriptorId::Mmpos, 1);
pub const MMTYPE_TYPE: SubSeq = SubSeq::new(DescriptorId::Mmtype, 0);
pub const MMTYPE_SUBSTITUTION: SubSeq = SubSeq::new(DescriptorId::Mmtype, 1);
pub const MMTYPE_INSERTION: SubSeq = SubSeq::new(DescriptorId::Mmtype, 2);
pub const CLIPS_RECORD_ID: SubSeq = SubSeq::new(DescriptorId::Clips, 0);
pub const CLIPS_TYPE: SubSeq = SubSeq::new(DescriptorId::Clips, 1);
pub const CLIPS_SOFT_STRING: SubSeq = SubSeq::new(DescriptorId::Clips, 2);
pub const CLIPS_HARD_LENGTH: SubSeq = SubSeq::new(DescriptorId::Clips, 3);
pub const UREADS: SubSeq = SubSeq::new(DescriptorId::Ureads, 0);
pub const RLEN: SubSeq = SubSeq::new(DescriptorId::Rlen, 0);
pub const PAIR_CASE: SubSeq = SubSeq::new(DescriptorId::Pair, 0);
pub const PAIR_SAME_REC: SubSeq = SubSeq::new(DescriptorId::Pair, 1);
pub const PAIR_R1_SPLIT: SubSeq = SubSeq::new(DescriptorId::Pair, 2);
pub const PAIR_R2_SPLIT: SubSeq = SubSeq::new(DescriptorId::Pair, 3);
pub const PAIR_R1_DIFF_SEQ: SubSeq = SubSeq::new(DescriptorId::Pair, 4);
pub const PAIR_R2_DIFF_SEQ: SubSeq = SubSeq::new(DescriptorId::Pair, 5);
pub const PAIR_R1_DIFF_POS: SubSeq = SubSeq::new(DescriptorId::Pair, 6);
pub const PAIR_R2_DIFF_POS: SubSeq = SubSeq::new(DescriptorId::Pair, 7);
pub const MSCORE: SubSeq = SubSeq::new(DescriptorId::Mscore, 0);
pub const MMAP_NUM_ALIGNMENTS: SubSeq = SubSeq::new(DescriptorId::Mmap, 0);
pub const MMAP_MORE_ALIGNMENTS: SubSeq = SubSeq::new(DescriptorId::Mmap, 2);
pub const MMAP_NEXT_SEQ: SubSeq = SubSeq::new(DescriptorId::Mmap, 3);
pub const MMAP_NEXT_POS: SubSeq = SubSeq::new(DescriptorId::Mmap, 4);
pub const RTYPE: SubSeq = SubSeq::new(DescriptorId::Rtype, 0);
pub const RGROUP: SubSeq = SubSeq::new(DescriptorId::Rgroup, 0);
pub const QV_PRESENT: SubSeq = SubSeq::new(DescriptorId::Qv, 0);
pub const QV_CODEBOOK: SubSeq = SubSeq::new(DescriptorId::Qv, 1);

/// Sub-sequence carrying the symbols of QV codebook `codebook`
#[must_use]
pub fn qv_symbols(codebook: usize) -> SubSeq {
    SubSeq::new(DescriptorId::Qv, 2 + codebook as u8)
}

/// Maximum number of QV codebooks addressable by the QV sub-sequence ids
pub const MAX_QV_CODEBOOKS: usize = 6;

// Record types
pub const RTYPE_PERFECT: u64 = 1;
pub const RTYPE_NOISE: u64 = 3;
pub const RTYPE_LITERAL: u64 = 5;

// Clip entry layout
pub const CLIP_HARD_BIT: u64 = 0b100;
pub const CLIP_SEGMENT_BIT: u64 = 0b010;
pub const CLIP_RIGHT_BIT: u64 = 0b001;
pub const CLIP_END: u64 = 8;

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_table_order() {
        for (idx, id) in DescriptorId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, idx);
        }
        assert!(POS_FIRST < RCOMP);
        assert!(qv_symbols(0) < qv_symbols(5));
        assert_eq!(qv_symbols(5).index, 7);
    }

    #[test]
    fn test_subseq_validation() {
        assert!(SubSeq::from_ids(8, 7).is_ok());
        assert!(SubSeq::from_ids(1, 1).is_err());
        assert!(SubSeq::from_ids(18, 0).is_err());
        assert_eq!(SubSeq::from_ids(14, 3).unwrap().to_string(), "QV[3]");
    }
}
