use crate::core::{ClassId, Clips, Noise, PairingCase};

/// Strand and position of one splice of an aligned segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceAlignment {
    /// Reference position; `None` for segments stored as literals
    pub position: Option<u64>,
    pub reverse: bool,
}

/// Placement of one aligned segment within one alignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentAlignment {
    pub splices: Vec<SpliceAlignment>,
    /// One mapping score per alignment-score depth
    pub scores: Vec<u64>,
}
impl SegmentAlignment {
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.splices.first().and_then(|s| s.position)
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.splices.first().is_some_and(|s| s.reverse)
    }
}

/// One alignment of the record: the primary one comes first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub segments: Vec<SegmentAlignment>,
    /// Auxiliary token attached to secondary alignments
    pub msar: Option<String>,
}

/// One decoded read segment
///
/// Bases and qualities are in sequenced orientation; clips and noise in
/// reference-forward orientation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSegment {
    /// Bases held by the segment (hard clips excluded)
    pub length: u64,
    /// `None` when the bases depend on a reference that is not available
    pub bases: Option<Vec<u8>>,
    /// One quality string per QV depth; empty when absent
    pub qualities: Vec<Vec<u8>>,
    pub clips: Clips,
    pub noise: Vec<Noise>,
    /// Read bases per splice (a single entry for unspliced segments)
    pub splice_lengths: Vec<u64>,
}

/// One decoded template: a single read or both mates of a pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomicRecord {
    pub class: ClassId,
    pub segments: Vec<RecordSegment>,
    /// Primary alignment first; empty for unmapped records
    pub alignments: Vec<Alignment>,
    pub pairing: Option<PairingCase>,
    pub read_group: Option<u64>,
    /// Three flag bits
    pub flags: u8,
    /// (sequence id, position) of further alignments stored elsewhere
    pub more_alignments: Option<(u64, u64)>,
}
impl GenomicRecord {
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Primary position of the first segment
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.segment_position(0)
    }

    /// Primary position of a segment, `None` when unmapped
    #[must_use]
    pub fn segment_position(&self, segment: usize) -> Option<u64> {
        self.primary(segment).and_then(SegmentAlignment::position)
    }

    /// Strand of a segment in its primary alignment
    #[must_use]
    pub fn is_reverse(&self, segment: usize) -> bool {
        self.primary(segment).is_some_and(SegmentAlignment::is_reverse)
    }

    /// Mapping scores of a segment in its primary alignment
    #[must_use]
    pub fn scores(&self, segment: usize) -> &[u64] {
        self.primary(segment).map_or(&[], |s| s.scores.as_slice())
    }

    fn primary(&self, segment: usize) -> Option<&SegmentAlignment> {
        self.alignments.first().and_then(|a| a.segments.get(segment))
    }

    /// Lengths of all segments
    #[must_use]
    pub fn lengths(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.length).collect()
    }
}
