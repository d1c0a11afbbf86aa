use std::borrow::Cow;

use crate::alphabet::Alphabet;
use crate::core::{ClassId, Clips, Noise, NoiseKind};
use crate::error::{RecordShapeError, Result};
use crate::params::ParameterSet;

/// Alignment of a read against the reference
///
/// Clips and noise columns are given in reference-forward orientation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadAlignment {
    /// 0-based reference position of the first aligned base
    pub position: u64,
    /// The read aligns to the reverse strand
    pub reverse: bool,
    /// Noise events ordered by column
    pub noise: Vec<Noise>,
    pub clips: Clips,
}
impl ReadAlignment {
    #[must_use]
    pub fn new(position: u64) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    #[must_use]
    pub fn with_noise(mut self, noise: Vec<Noise>) -> Self {
        self.noise = noise;
        self
    }

    #[must_use]
    pub fn with_clips(mut self, clips: Clips) -> Self {
        self.clips = clips;
        self
    }

    /// Number of reference bases covered given the read length
    #[must_use]
    pub fn reference_length(&self, length: u64) -> u64 {
        let (insertions, deletions) =
            self.noise
                .iter()
                .fold((0, 0), |(ins, del), n| match n.kind {
                    NoiseKind::Insertion(_) => (ins + 1, del),
                    NoiseKind::Deletion => (ins, del + 1),
                    NoiseKind::Substitution { .. } => (ins, del),
                });
        (length.saturating_sub(self.clips.soft_len()) + deletions).saturating_sub(insertions)
    }

    /// Smallest class able to represent this alignment
    #[must_use]
    pub fn class(&self) -> ClassId {
        let mut class = ClassId::P;
        if !self.clips.is_empty() {
            return ClassId::I;
        }
        for noise in &self.noise {
            match noise.kind {
                NoiseKind::Insertion(_) | NoiseKind::Deletion => return ClassId::I,
                NoiseKind::Substitution { base: b'N', .. } => class = class.max(ClassId::N),
                NoiseKind::Substitution { .. } => class = ClassId::M,
            }
        }
        class
    }
}

/// One sequencing read as handed to the encoder
///
/// Bases and qualities are in sequenced orientation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequencedRead {
    /// Number of bases held by the read (hard clips excluded)
    pub length: u64,
    /// Bases; required for unaligned reads
    pub sequence: Option<Vec<u8>>,
    /// One quality string per QV depth, empty when absent
    pub qualities: Vec<Vec<u8>>,
    pub alignment: Option<ReadAlignment>,
    /// Three flag bits (duplicate, QC failure, proper pair)
    pub flags: u8,
    pub read_group: Option<u64>,
    /// Mapping scores, one per alignment-score depth
    pub mapping_scores: Vec<u64>,
}
impl SequencedRead {
    #[must_use]
    pub fn new(length: u64) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// A read carrying its bases
    #[must_use]
    pub fn from_sequence(sequence: &[u8]) -> Self {
        Self {
            length: sequence.len() as u64,
            sequence: Some(sequence.to_vec()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: ReadAlignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Append one quality string
    #[must_use]
    pub fn with_qualities(mut self, qualities: &[u8]) -> Self {
        self.qualities.push(qualities.to_vec());
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_read_group(mut self, group: u64) -> Self {
        self.read_group = Some(group);
        self
    }

    #[must_use]
    pub fn with_mapping_scores(mut self, scores: Vec<u64>) -> Self {
        self.mapping_scores = scores;
        self
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.alignment.is_some()
    }

    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.alignment.as_ref().map(|a| a.position)
    }

    /// Bases in reference-forward orientation
    pub(crate) fn forward_bases<'a>(&'a self, alphabet: &Alphabet) -> Option<Cow<'a, [u8]>> {
        let seq = self.sequence.as_deref()?;
        match &self.alignment {
            Some(a) if a.reverse => Some(Cow::Owned(alphabet.reverse_complement(seq))),
            _ => Some(Cow::Borrowed(seq)),
        }
    }
}

/// Checks every read against the parameter set before any stream is written
pub(crate) fn validate_reads(reads: &[SequencedRead], params: &ParameterSet) -> Result<()> {
    reads
        .iter()
        .enumerate()
        .try_for_each(|(index, read)| validate_read(index, read, params))
}

fn check_len(index: usize, attribute: &'static str, expected: u64, actual: usize) -> Result<()> {
    if expected == actual as u64 {
        Ok(())
    } else {
        Err(RecordShapeError::LengthMismatch {
            index,
            attribute,
            expected,
            actual: actual as u64,
        }
        .into())
    }
}

fn check_base(index: usize, base: u8, alphabet: &Alphabet) -> Result<()> {
    if alphabet.contains(base) {
        Ok(())
    } else {
        Err(RecordShapeError::InvalidBase {
            index,
            base: char::from(base),
        }
        .into())
    }
}

fn validate_read(index: usize, read: &SequencedRead, params: &ParameterSet) -> Result<()> {
    let alphabet = params.alphabet();
    if read.length == 0 {
        return Err(RecordShapeError::EmptyRead(index).into());
    }

    match &read.sequence {
        Some(seq) => {
            check_len(index, "sequence", read.length, seq.len())?;
            for &base in seq {
                check_base(index, base, alphabet)?;
            }
        }
        None if !read.is_aligned() => return Err(RecordShapeError::MissingSequence(index).into()),
        None => {}
    }

    let qv = params.qv();
    if qv.enabled() && !read.qualities.is_empty() {
        check_len(index, "quality strands", u64::from(qv.depth), read.qualities.len())?;
        for strand in &read.qualities {
            check_len(index, "qualities", read.length, strand.len())?;
        }
    }

    if !read.mapping_scores.is_empty() && read.mapping_scores.len() != usize::from(params.as_depth())
    {
        return Err(RecordShapeError::ScoreDepth {
            index,
            expected: usize::from(params.as_depth()),
            actual: read.mapping_scores.len(),
        }
        .into());
    }

    if let Some(group) = read.read_group {
        if params.num_groups() > 0 && group >= params.num_groups() {
            return Err(RecordShapeError::ReadGroupOutOfRange {
                index,
                group,
                num_groups: params.num_groups(),
            }
            .into());
        }
    }

    let hard = read.alignment.as_ref().map_or(0, |a| a.clips.hard_len());
    if params.read_length() > 0 {
        check_len(index, "read length", params.read_length(), (read.length + hard) as usize)?;
    }

    if let Some(alignment) = &read.alignment {
        validate_alignment(index, read, alignment, alphabet)?;
    }
    Ok(())
}

fn validate_alignment(
    index: usize,
    read: &SequencedRead,
    alignment: &ReadAlignment,
    alphabet: &Alphabet,
) -> Result<()> {
    let soft = alignment.clips.soft_len();
    if soft >= read.length {
        return Err(RecordShapeError::ClipOverrun {
            clipped: soft,
            length: read.length,
        }
        .into());
    }
    let aligned = read.length - soft;

    let deletions = alignment
        .noise
        .iter()
        .filter(|n| n.kind == NoiseKind::Deletion)
        .count() as u64;
    let columns = aligned + deletions;

    let forward = read.forward_bases(alphabet);
    let mut previous: Option<u64> = None;
    let mut read_offset = 0;
    for noise in &alignment.noise {
        if previous.is_some_and(|p| noise.column <= p) {
            return Err(RecordShapeError::UnorderedMismatches { index }.into());
        }
        if noise.column >= columns {
            return Err(RecordShapeError::MismatchOutOfRange {
                index,
                offset: noise.column,
                aligned: columns,
            }
            .into());
        }

        // read bases consumed before this column: every column that is not a deletion
        let consumed_before = read_offset + noise.column - previous.map_or(0, |p| p + 1);
        match noise.kind {
            NoiseKind::Substitution { base, reference } => {
                check_base(index, base, alphabet)?;
                check_base(index, reference, alphabet)?;
                if let Some(seq) = &forward {
                    let found = seq.get((soft_left(alignment) + consumed_before) as usize);
                    if found != Some(&base) {
                        return Err(RecordShapeError::NoiseBaseMismatch {
                            index,
                            column: noise.column,
                        }
                        .into());
                    }
                }
                read_offset = consumed_before + 1;
            }
            NoiseKind::Insertion(base) => {
                check_base(index, base, alphabet)?;
                if let Some(seq) = &forward {
                    let found = seq.get((soft_left(alignment) + consumed_before) as usize);
                    if found != Some(&base) {
                        return Err(RecordShapeError::NoiseBaseMismatch {
                            index,
                            column: noise.column,
                        }
                        .into());
                    }
                }
                read_offset = consumed_before + 1;
            }
            NoiseKind::Deletion => read_offset = consumed_before,
        }
        previous = Some(noise.column);
    }

    if alignment
        .position
        .checked_add(alignment.reference_length(read.length))
        .is_none()
    {
        return Err(RecordShapeError::PositionOverflow { index }.into());
    }
    Ok(())
}

fn soft_left(alignment: &ReadAlignment) -> u64 {
    alignment.clips.left.soft_len()
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::core::Clip;
    use crate::params::ParameterSetBuilder;

    #[test]
    fn test_alignment_class() {
        assert_eq!(ReadAlignment::new(0).class(), ClassId::P);
        let n = ReadAlignment::new(0).with_noise(vec![Noise::substitution(2, b'N', b'A')]);
        assert_eq!(n.class(), ClassId::N);
        let m = ReadAlignment::new(0).with_noise(vec![
            Noise::substitution(1, b'N', b'A'),
            Noise::substitution(2, b'C', b'A'),
        ]);
        assert_eq!(m.class(), ClassId::M);
        let i = ReadAlignment::new(0).with_noise(vec![Noise::deletion(3)]);
        assert_eq!(i.class(), ClassId::I);
        let clipped =
            ReadAlignment::new(0).with_clips(Clips::new(Clip::Hard(2), Clip::None));
        assert_eq!(clipped.class(), ClassId::I);
    }

    #[test]
    fn test_reference_length() {
        let a = ReadAlignment::new(10)
            .with_noise(vec![Noise::insertion(1, b'A'), Noise::deletion(4), Noise::deletion(5)])
            .with_clips(Clips::new(Clip::Soft(2), Clip::None));
        // 10 bases, 2 soft clipped, one inserted, two deleted
        assert_eq!(a.reference_length(10), 9);
    }

    #[test]
    fn test_validation_accepts_consistent_read() -> crate::Result<()> {
        let params = ParameterSetBuilder::default().build()?;
        let read = SequencedRead::from_sequence(b"ACGTA")
            .with_qualities(b"IIIII")
            .with_alignment(ReadAlignment::new(4).with_noise(vec![
                Noise::substitution(1, b'C', b'T'),
                Noise::insertion(2, b'G'),
                Noise::deletion(3),
                Noise::substitution(5, b'A', b'G'),
            ]));
        validate_reads(&[read], &params)
    }

    #[test]
    fn test_validation_failures() -> crate::Result<()> {
        let params = ParameterSetBuilder::default().num_groups(2).build()?;
        let cases = [
            SequencedRead::new(0).with_alignment(ReadAlignment::new(0)),
            SequencedRead::new(4),
            SequencedRead::from_sequence(b"ACGX"),
            SequencedRead::from_sequence(b"ACGT").with_qualities(b"II"),
            SequencedRead::from_sequence(b"ACGT").with_read_group(2),
            SequencedRead::from_sequence(b"ACGT").with_mapping_scores(vec![3]),
            SequencedRead::from_sequence(b"ACGT").with_alignment(
                ReadAlignment::new(0)
                    .with_noise(vec![Noise::substitution(2, b'A', b'C'), Noise::deletion(1)]),
            ),
            SequencedRead::from_sequence(b"ACGT").with_alignment(
                ReadAlignment::new(0).with_noise(vec![Noise::substitution(2, b'A', b'C')]),
            ),
            SequencedRead::new(4)
                .with_alignment(ReadAlignment::new(0).with_noise(vec![Noise::deletion(5)])),
            SequencedRead::new(4).with_alignment(
                ReadAlignment::new(0).with_clips(Clips::new(Clip::Soft(2), Clip::Soft(2))),
            ),
            SequencedRead::new(4).with_alignment(ReadAlignment::new(u64::MAX - 1)),
        ];
        for (idx, read) in cases.into_iter().enumerate() {
            let err = validate_reads(&[read], &params).unwrap_err();
            assert!(err.is_record_shape_mismatch(), "case {idx}: {err}");
        }
        Ok(())
    }

    #[test]
    fn test_fixed_read_length_counts_hard_clips() -> crate::Result<()> {
        let params = ParameterSetBuilder::default().read_length(6).build()?;
        let read = SequencedRead::new(4).with_alignment(
            ReadAlignment::new(0).with_clips(Clips::new(Clip::Hard(2), Clip::None)),
        );
        validate_reads(&[read], &params)?;
        assert!(validate_reads(&[SequencedRead::from_sequence(b"ACGT")], &params).is_err());
        Ok(())
    }

    #[test]
    fn test_forward_bases() {
        let alphabet = Alphabet::default();
        let read = SequencedRead::from_sequence(b"AACG")
            .with_alignment(ReadAlignment::new(0).reversed(true));
        assert_eq!(read.forward_bases(&alphabet).as_deref(), Some(&b"CGTT"[..]));
        assert!(SequencedRead::new(3).forward_bases(&alphabet).is_none());
    }
}
