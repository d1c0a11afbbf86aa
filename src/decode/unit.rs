//! Record-by-record state machine over the streams of one access unit
//!
//! ```text
//!  literals ─► classify ─► clips ─► lengths ─► splices ─► alignment count
//!     ─► position ─► mate ─► strands ─► read group ─► scores / MSAR
//!     ─► flags ─► noise ─► bases ─► qualities ─► record
//! ```
//!
//! Positions and the literal cursor are carried from record to record, so the
//! first failure ends the access unit.

use crate::alphabet::Alphabet;
use crate::core::quality::{CodebookSelector, QualityLayout, SpliceSpan};
use crate::core::{
    AccessUnit, CLIP_END, CLIP_HARD_BIT, CLIP_RIGHT_BIT, CLIP_SEGMENT_BIT, CLIPS_HARD_LENGTH,
    CLIPS_RECORD_ID, CLIPS_SOFT_STRING, CLIPS_TYPE, ClassId, Clip, Clips, DescriptorStreamSet,
    FLAGS, MMAP_MORE_ALIGNMENTS, MMAP_NEXT_POS, MMAP_NEXT_SEQ, MMAP_NUM_ALIGNMENTS,
    MMPOS_POSITION, MMPOS_TERMINATOR, MMTYPE_INSERTION, MMTYPE_SUBSTITUTION, MMTYPE_TYPE, MSCORE,
    Noise, NoiseKind, PAIR_CASE, POS_ADDITIONAL, POS_FIRST, PairingCase, QV_PRESENT, RCOMP,
    RGROUP, RLEN, RTYPE, RTYPE_LITERAL, RTYPE_NOISE, RTYPE_PERFECT, SubSeq, UREADS, qv_symbols,
};
use crate::error::{ConfigError, RecordShapeError, Result, StreamError};
use crate::params::ParameterSet;

use super::{Alignment, GenomicRecord, RecordSegment, SegmentAlignment, SpliceAlignment};

/// Embedded reference bases starting at `position`
struct EmbeddedRun {
    position: u64,
    bases: Vec<u8>,
}

/// Bases addressable by virtual position
///
/// Positions below `end` are served by the embedded reference runs, then by
/// the external reference; `end..` by the unaligned literals in the order
/// they were read.
struct VirtualSequence<'a> {
    start: u64,
    end: u64,
    runs: Vec<EmbeddedRun>,
    literals: Vec<u8>,
    external: Option<&'a [u8]>,
}
impl VirtualSequence<'_> {
    fn base(&self, position: u64) -> Result<Option<u8>> {
        let out_of_range = |length: u64| StreamError::PositionOutOfRange { position, length };
        if position >= self.end {
            let offset = position - self.end;
            return match usize::try_from(offset).ok().and_then(|o| self.literals.get(o)) {
                Some(&base) => Ok(Some(base)),
                None => Err(out_of_range(self.literals.len() as u64).into()),
            };
        }
        let run = self
            .runs
            .partition_point(|r| r.position <= position)
            .checked_sub(1)
            .map(|i| &self.runs[i]);
        if let Some(&base) = run.and_then(|r| r.bases.get((position - r.position) as usize)) {
            return Ok(Some(base));
        }
        match self.external {
            Some(reference) => match reference.get(position as usize) {
                Some(&base) => Ok(Some(base)),
                None => Err(out_of_range(reference.len() as u64).into()),
            },
            None if self.runs.is_empty() => Ok(None),
            None => Err(out_of_range(self.end).into()),
        }
    }

    /// End of the last embedded run, `start` before the first one
    fn runs_end(&self) -> u64 {
        self.runs
            .last()
            .map_or(self.start, |r| r.position + r.bases.len() as u64)
    }

    fn is_literal(&self, position: u64) -> bool {
        position >= self.end
    }
}

/// Segment counts of a record
#[derive(Debug, Clone, Copy)]
struct Shape {
    record_segments: usize,
    aligned_segments: usize,
}

/// Per-segment decoding scratch
#[derive(Debug, Clone, Default)]
struct SegmentState {
    length: u64,
    clips: Clips,
    soft_bases: [Vec<u8>; 2],
    splice_lengths: Vec<u64>,
    splice_gaps: Vec<u64>,
    noise: Vec<Noise>,
}

pub(crate) struct UnitDecoder<'a> {
    params: &'a ParameterSet,
    alphabet: &'a Alphabet,
    class: ClassId,
    streams: DescriptorStreamSet,
    previous: u64,
    sequence: VirtualSequence<'a>,
    /// Leading literal entries still to be read as reference runs
    runs_pending: u64,
    selector: CodebookSelector<'a>,
    msar: std::slice::Iter<'a, String>,
}
impl<'a> UnitDecoder<'a> {
    pub fn new(
        params: &'a ParameterSet,
        unit: &AccessUnit,
        external: Option<&'a [u8]>,
        msar: &'a [String],
    ) -> Result<Self> {
        let class = unit.class()?;
        let mut streams = unit.streams.clone();
        streams.rewind();
        Ok(Self {
            params,
            alphabet: params.alphabet(),
            class,
            streams,
            previous: unit.header.start_position,
            sequence: VirtualSequence {
                start: unit.header.start_position,
                end: unit.header.end_position,
                runs: Vec::new(),
                literals: Vec::new(),
                external,
            },
            runs_pending: unit.header.reference_runs,
            selector: CodebookSelector::new(params.qv(), class),
            msar: msar.iter(),
        })
    }

    /// Checks that every value of the access unit was consumed
    pub fn finish(self) -> Result<()> {
        self.streams.ensure_consumed()
    }

    fn mapped(&self) -> bool {
        self.class != ClassId::U
    }

    fn pop_symbol(&mut self, subseq: SubSeq) -> Result<u8> {
        let value = self.streams.pop(subseq)?;
        self.alphabet.decode(value).ok_or_else(|| {
            StreamError::SymbolOutOfRange {
                subseq,
                value,
                limit: self.alphabet.size(),
            }
            .into()
        })
    }

    fn pop_bases(&mut self, subseq: SubSeq, length: u64) -> Result<Vec<u8>> {
        self.streams.ensure_remaining(subseq, length)?;
        (0..length).map(|_| self.pop_symbol(subseq)).collect()
    }

    /// Length stored as `length - 1`
    fn pop_length(&mut self) -> Result<u64> {
        let value = self.streams.pop(RLEN)?;
        value
            .checked_add(1)
            .ok_or_else(|| StreamError::ValueOverflow { subseq: RLEN, value }.into())
    }

    pub fn decode_record(&mut self, record_index: usize) -> Result<GenomicRecord> {
        let rtype = self.read_record_type()?;
        let shape = self.classify()?;
        let mut segments = vec![SegmentState::default(); shape.record_segments];

        self.read_clips(record_index, &mut segments)?;
        self.read_lengths(&mut segments)?;
        self.read_splices(shape, &mut segments)?;

        let (num_alignments, more_alignments) = self.read_alignment_count(shape)?;

        // positions: primary first segment, splice gaps, secondary alignments
        let mut first_position = 0;
        let mut secondary_deltas = Vec::new();
        if shape.aligned_segments > 0 {
            first_position = self.previous.wrapping_add(self.streams.pop(POS_FIRST)?);
            self.previous = first_position;
            for segment in segments.iter_mut().take(shape.aligned_segments) {
                for _ in 1..segment.splice_lengths.len() {
                    segment.splice_gaps.push(self.streams.pop(POS_ADDITIONAL)?);
                }
            }
            for _ in 1..num_alignments {
                let deltas = (0..shape.aligned_segments)
                    .map(|_| self.streams.pop(POS_ADDITIONAL))
                    .collect::<Result<Vec<_>>>()?;
                secondary_deltas.push(deltas);
            }
        }

        let pairing = if self.params.is_paired() && self.class != ClassId::HM {
            Some(PairingCase::pop(&mut self.streams)?)
        } else {
            None
        };

        let mut primary_positions = Vec::with_capacity(shape.aligned_segments);
        if shape.aligned_segments > 0 {
            primary_positions.push(first_position);
        }
        if shape.aligned_segments == 2 {
            // two aligned segments only follow a same-record case
            if let Some(PairingCase::SameRecord { delta, .. }) = pairing {
                primary_positions.push(first_position.wrapping_add(delta));
            } else {
                let case = pairing.map_or(u64::from(self.class as u8), |p| p.discriminant());
                return Err(StreamError::UnknownPairingCase(case).into());
            }
        }

        let mut alignments = Vec::with_capacity(num_alignments);
        for alignment in 0..num_alignments {
            let mut aligned = Vec::with_capacity(shape.aligned_segments);
            for (s, segment) in segments.iter().take(shape.aligned_segments).enumerate() {
                let base = match alignment {
                    0 => primary_positions[s],
                    a => primary_positions[s].wrapping_add(secondary_deltas[a - 1][s]),
                };
                let mut splices = Vec::with_capacity(segment.splice_lengths.len());
                let mut position = base;
                for j in 0..segment.splice_lengths.len() {
                    if j > 0 {
                        position = position
                            .wrapping_add(segment.splice_lengths[j - 1])
                            .wrapping_add(segment.splice_gaps[j - 1]);
                    }
                    splices.push(SpliceAlignment {
                        position: Some(position),
                        reverse: self.streams.pop_flag(RCOMP)?,
                    });
                }
                aligned.push(SegmentAlignment {
                    splices,
                    scores: Vec::new(),
                });
            }
            alignments.push(Alignment {
                segments: aligned,
                msar: None,
            });
        }

        let read_group = if self.params.num_groups() > 0 {
            Some(self.streams.pop(RGROUP)?)
        } else {
            None
        };

        let depth = usize::from(self.params.as_depth());
        for alignment in &mut alignments {
            for segment in &mut alignment.segments {
                segment.scores = (0..depth)
                    .map(|_| self.streams.pop(MSCORE))
                    .collect::<Result<_>>()?;
            }
        }
        for alignment in alignments.iter_mut().skip(1) {
            alignment.msar = self.msar.next().cloned();
        }

        let mut flags = 0;
        if self.streams.remaining(FLAGS[0]) > 0 {
            for (bit, subseq) in FLAGS.iter().enumerate() {
                flags |= u8::from(self.streams.pop_flag(*subseq)?) << bit;
            }
        }

        if rtype == Some(RTYPE_NOISE) {
            for segment in segments.iter_mut().take(shape.aligned_segments) {
                segment.noise = self.read_noise()?;
            }
        }

        let primary = alignments.first().cloned().unwrap_or_default();
        let mut record_segments = Vec::with_capacity(shape.record_segments);
        for (s, mut segment) in segments.into_iter().enumerate() {
            let placement = primary.segments.get(s);
            let bases = match placement {
                Some(alignment) if self.mapped() => self.rebuild_bases(&mut segment, alignment)?,
                _ => Some(self.pop_bases(UREADS, segment.length)?),
            };
            let qualities = self.read_qualities(&segment, placement)?;
            record_segments.push(RecordSegment {
                length: segment.length,
                bases,
                qualities,
                clips: segment.clips,
                noise: segment.noise,
                splice_lengths: segment.splice_lengths,
            });
        }

        // literal placements are reported as unmapped
        if self.mapped() {
            for alignment in &mut alignments {
                for segment in &mut alignment.segments {
                    for splice in &mut segment.splices {
                        if splice.position.is_some_and(|p| self.sequence.is_literal(p)) {
                            splice.position = None;
                        }
                    }
                }
            }
        }

        Ok(GenomicRecord {
            class: self.class,
            segments: record_segments,
            alignments,
            pairing,
            read_group,
            flags,
            more_alignments,
        })
    }

    /// Record type of mapped classes, consuming the literal entries before it
    fn read_record_type(&mut self) -> Result<Option<u64>> {
        if !self.mapped() {
            return Ok(None);
        }
        loop {
            match self.streams.pop(RTYPE)? {
                RTYPE_LITERAL => self.read_literal()?,
                rtype @ (RTYPE_PERFECT | RTYPE_NOISE) => return Ok(Some(rtype)),
                other => return Err(StreamError::UnknownRecordType(other).into()),
            }
        }
    }

    fn read_literal(&mut self) -> Result<()> {
        if self.runs_pending == 0 {
            let length = self.pop_length()?;
            let bases = self.pop_bases(UREADS, length)?;
            self.sequence.literals.extend_from_slice(&bases);
            return Ok(());
        }

        self.runs_pending -= 1;
        let previous_end = self.sequence.runs_end();
        let position = if self.sequence.runs.is_empty() {
            previous_end
        } else {
            let gap = self.streams.pop(POS_ADDITIONAL)?;
            previous_end.checked_add(gap).ok_or(StreamError::ValueOverflow {
                subseq: POS_ADDITIONAL,
                value: gap,
            })?
        };
        let length = self.pop_length()?;
        let end = position
            .checked_add(length)
            .filter(|&end| end <= self.sequence.end);
        if end.is_none() {
            return Err(StreamError::PositionOutOfRange {
                position,
                length: self.sequence.end,
            }
            .into());
        }
        let bases = self.pop_bases(UREADS, length)?;
        self.sequence.runs.push(EmbeddedRun { position, bases });
        Ok(())
    }

    fn classify(&self) -> Result<Shape> {
        let paired = self.params.is_paired();
        let record_segments = match self.class {
            _ if !paired => 1,
            ClassId::HM => 2,
            _ if self.streams.peek(PAIR_CASE) == Some(0) => 2,
            _ => 1,
        };
        let aligned_segments = match self.class {
            ClassId::HM => 1,
            ClassId::U if self.params.crps_flag() => match self.params.cr_alg_id() {
                2 | 4 => record_segments,
                other => return Err(ConfigError::ComputedReference(other).into()),
            },
            ClassId::U => 0,
            _ => record_segments,
        };
        Ok(Shape {
            record_segments,
            aligned_segments,
        })
    }

    fn read_clips(&mut self, record_index: usize, segments: &mut [SegmentState]) -> Result<()> {
        if !self.class.has_clips() || self.streams.peek(CLIPS_RECORD_ID) != Some(record_index as u64)
        {
            return Ok(());
        }
        self.streams.pop(CLIPS_RECORD_ID)?;
        loop {
            let clip_type = self.streams.pop(CLIPS_TYPE)?;
            if clip_type == CLIP_END {
                return Ok(());
            }
            let segment = usize::from(clip_type & CLIP_SEGMENT_BIT != 0);
            if clip_type > CLIP_HARD_BIT | CLIP_SEGMENT_BIT | CLIP_RIGHT_BIT
                || segment >= segments.len()
            {
                return Err(StreamError::UnknownClipType(clip_type).into());
            }
            let side = usize::from(clip_type & CLIP_RIGHT_BIT != 0);
            let clip = if clip_type & CLIP_HARD_BIT == 0 {
                let terminator = self.alphabet.size() as u64;
                let mut bases = Vec::new();
                while self.streams.peek(CLIPS_SOFT_STRING) != Some(terminator) {
                    bases.push(self.pop_symbol(CLIPS_SOFT_STRING)?);
                }
                self.streams.pop(CLIPS_SOFT_STRING)?;
                let clip = Clip::Soft(bases.len() as u64);
                segments[segment].soft_bases[side] = bases;
                clip
            } else {
                Clip::Hard(self.streams.pop(CLIPS_HARD_LENGTH)?)
            };
            let clips = &mut segments[segment].clips;
            if side == 0 {
                clips.left = clip;
            } else {
                clips.right = clip;
            }
        }
    }

    fn read_lengths(&mut self, segments: &mut [SegmentState]) -> Result<()> {
        let read_length = self.params.read_length();
        for segment in segments {
            segment.length = if read_length == 0 {
                self.pop_length()?
            } else {
                let hard = segment.clips.hard_len();
                read_length
                    .checked_sub(hard)
                    .ok_or(RecordShapeError::ClipOverrun {
                        clipped: hard,
                        length: read_length,
                    })?
            };
        }
        Ok(())
    }

    fn read_splices(&mut self, shape: Shape, segments: &mut [SegmentState]) -> Result<()> {
        let spliced = self.params.spliced_reads() && self.class.has_clips();
        for segment in segments.iter_mut().take(shape.aligned_segments) {
            let soft = segment.clips.soft_len();
            if soft >= segment.length {
                return Err(RecordShapeError::ClipOverrun {
                    clipped: soft,
                    length: segment.length,
                }
                .into());
            }
            let aligned = segment.length - soft;
            if !spliced {
                segment.splice_lengths = vec![aligned];
                continue;
            }
            let mut sum = 0;
            while sum < aligned {
                let length = self.streams.pop(RLEN)?;
                if length == 0 {
                    return Err(RecordShapeError::ZeroSpliceLength.into());
                }
                sum = sum.saturating_add(length);
                if sum > aligned {
                    return Err(RecordShapeError::SpliceOverrun {
                        sum,
                        length: aligned,
                    }
                    .into());
                }
                segment.splice_lengths.push(length);
            }
        }
        Ok(())
    }

    /// Number of alignments and the pointer to further alignments
    fn read_alignment_count(&mut self, shape: Shape) -> Result<(usize, Option<(u64, u64)>)> {
        if shape.aligned_segments == 0 {
            return Ok((0, None));
        }
        if !self.params.multiple_alignments() || !self.mapped() {
            return Ok((1, None));
        }
        let count = self.streams.pop(MMAP_NUM_ALIGNMENTS)?;
        if count == 0 {
            return Err(StreamError::ZeroAlignments.into());
        }
        let more = if self.streams.pop_flag(MMAP_MORE_ALIGNMENTS)? {
            Some((
                self.streams.pop(MMAP_NEXT_SEQ)?,
                self.streams.pop(MMAP_NEXT_POS)?,
            ))
        } else {
            None
        };
        Ok((count as usize, more))
    }

    fn read_noise(&mut self) -> Result<Vec<Noise>> {
        let mut noise = Vec::new();
        let mut previous: Option<u64> = None;
        loop {
            match self.streams.pop(MMPOS_TERMINATOR)? {
                0 => {}
                1 => return Ok(noise),
                other => {
                    return Err(StreamError::SymbolOutOfRange {
                        subseq: MMPOS_TERMINATOR,
                        value: other,
                        limit: 2,
                    }
                    .into());
                }
            }
            let gap = self.streams.pop(MMPOS_POSITION)?;
            let column = previous.map_or(gap, |p| p + gap + 1);
            let kind = match self.streams.pop(MMTYPE_TYPE)? {
                0 => NoiseKind::Substitution {
                    base: self.pop_symbol(MMTYPE_SUBSTITUTION)?,
                    // filled from the reference while rebuilding bases
                    reference: b'N',
                },
                1 => NoiseKind::Insertion(self.pop_symbol(MMTYPE_INSERTION)?),
                2 => NoiseKind::Deletion,
                other => return Err(StreamError::UnknownMismatchType(other).into()),
            };
            noise.push(Noise { column, kind });
            previous = Some(column);
        }
    }

    /// Bases of an aligned segment in sequenced orientation
    ///
    /// Also fills in the reference base of every substitution, `N` when the
    /// reference is not available.
    fn rebuild_bases(
        &self,
        segment: &mut SegmentState,
        alignment: &SegmentAlignment,
    ) -> Result<Option<Vec<u8>>> {
        let mut forward = segment.soft_bases[0].clone();

        let mut next_event = 0;
        let mut column = 0;
        for (splice, &length) in alignment.splices.iter().zip(&segment.splice_lengths) {
            let mut position = splice.position.unwrap_or_default();
            let mut emitted = 0;
            while emitted < length {
                let kind = segment
                    .noise
                    .get(next_event)
                    .filter(|n| n.column == column)
                    .map(|n| n.kind);
                if kind.is_some() {
                    next_event += 1;
                }
                match kind {
                    Some(NoiseKind::Deletion) => position = position.wrapping_add(1),
                    Some(NoiseKind::Insertion(base)) => {
                        forward.push(base);
                        emitted += 1;
                    }
                    Some(NoiseKind::Substitution { base, .. }) => {
                        let reference = self.sequence.base(position)?.unwrap_or(b'N');
                        segment.noise[next_event - 1].kind =
                            NoiseKind::Substitution { base, reference };
                        forward.push(base);
                        position = position.wrapping_add(1);
                        emitted += 1;
                    }
                    None => {
                        // no reference anywhere: the bases stay unknown
                        let Some(base) = self.sequence.base(position)? else {
                            return Ok(None);
                        };
                        forward.push(base);
                        position = position.wrapping_add(1);
                        emitted += 1;
                    }
                }
                column += 1;
            }
        }
        forward.extend_from_slice(&segment.soft_bases[1]);

        if alignment.is_reverse() {
            Ok(Some(self.alphabet.reverse_complement(&forward)))
        } else {
            Ok(Some(forward))
        }
    }

    fn read_qualities(
        &mut self,
        segment: &SegmentState,
        alignment: Option<&SegmentAlignment>,
    ) -> Result<Vec<Vec<u8>>> {
        let qv = self.params.qv();
        if !qv.enabled() {
            return Ok(Vec::new());
        }
        let present = if self.streams.remaining(QV_PRESENT) > 0 {
            self.streams.pop_flag(QV_PRESENT)?
        } else {
            true
        };
        if !present {
            return Ok(Vec::new());
        }

        let layout = match alignment {
            Some(alignment) => QualityLayout {
                left_soft: segment.clips.left.soft_len(),
                splices: alignment
                    .splices
                    .iter()
                    .zip(&segment.splice_lengths)
                    .map(|(splice, &length)| SpliceSpan {
                        position: splice.position.unwrap_or_default(),
                        length,
                        reverse: splice.reverse,
                    })
                    .collect(),
                right_soft: segment.clips.right.soft_len(),
                unmapped: 0,
            },
            None => QualityLayout::unmapped(segment.length),
        };
        let reverse = alignment.is_some_and(SegmentAlignment::is_reverse);

        // every stored quality takes one symbol from some codebook
        let available: u64 = (0..qv.codebooks.len())
            .map(|cb| self.streams.remaining(qv_symbols(cb)) as u64)
            .sum();
        if layout.len().saturating_mul(u64::from(qv.depth)) > available {
            let subseq = qv_symbols(0);
            return Err(StreamError::StreamExhausted {
                subseq,
                consumed: self.streams.size(subseq) - self.streams.remaining(subseq),
            }
            .into());
        }
        let origins = layout.origins();

        let mut strands = Vec::with_capacity(usize::from(qv.depth));
        for _ in 0..qv.depth {
            let mut qualities = Vec::with_capacity(origins.len());
            for origin in &origins {
                let codebook = self
                    .selector
                    .select_for_decoding(*origin, &mut self.streams)?;
                let subseq = qv_symbols(codebook);
                let symbol = self.streams.pop(subseq)?;
                let quality = qv.codebooks[codebook].reconstruct(symbol).ok_or(
                    StreamError::SymbolOutOfRange {
                        subseq,
                        value: symbol,
                        limit: qv.codebooks[codebook].len(),
                    },
                )?;
                qualities.push(quality);
            }
            if qv.reverse {
                layout.reverse_chunks(&mut qualities);
            }
            if reverse {
                qualities.reverse();
            }
            strands.push(qualities);
        }
        Ok(strands)
    }
}

