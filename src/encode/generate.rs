//! Descriptor stream generation for one block
//!
//! Per record, values are appended in the order the decoder consumes them:
//!
//! ```text
//!  [literals] RTYPE CLIPS RLEN POS PAIR RCOMP RGROUP MSCORE FLAGS MMPOS/MMTYPE UREADS QV
//! ```
//!
//! Literal entries (the embedded reference runs, then unmapped segments of
//! mapped classes) precede the record that needs them. Every reference run
//! after the first announces its distance from the end of the previous run in
//! `POS[1]`.

use tracing::debug;

use crate::alphabet::Alphabet;
use crate::core::quality::{BaseOrigin, CodebookSelector, QualityLayout, SpliceSpan};
use crate::core::{
    AccessUnit, AccessUnitHeader, CLIP_END, CLIP_HARD_BIT, CLIP_RIGHT_BIT, CLIP_SEGMENT_BIT,
    CLIPS_HARD_LENGTH, CLIPS_RECORD_ID, CLIPS_SOFT_STRING, CLIPS_TYPE, ClassId, Clip,
    DescriptorStreamSet, FLAGS, MMPOS_POSITION, MMPOS_TERMINATOR, MMTYPE_INSERTION,
    MMTYPE_SUBSTITUTION, MMTYPE_TYPE, MSCORE, NoiseKind, POS_ADDITIONAL, POS_FIRST, PairingCase,
    QV_PRESENT, RCOMP, RGROUP, RLEN, RTYPE, RTYPE_LITERAL, RTYPE_NOISE, RTYPE_PERFECT, SubSeq,
    UREADS, qv_symbols,
};
use crate::error::{ConfigError, RecordShapeError, Result};
use crate::parallel::BlockProcessor;
use crate::params::ParameterSet;

use super::block::{BlockAssignment, BlockPlan, PlannedRecord, mate_of};
use super::reference::block_reference;
use super::{PairingStats, SequencedRead};

/// Placement of one segment inside the block
#[derive(Debug, Clone, Copy)]
struct SegmentPlacement {
    /// Reference position, or virtual position inside the literal region
    position: u64,
    reverse: bool,
}

/// Mutable state carried from record to record
struct BlockState<'a> {
    streams: DescriptorStreamSet,
    class: ClassId,
    /// Previous record position, for POS deltas
    previous: u64,
    /// Next free virtual position of the literal region
    cursor: u64,
    has_flags: bool,
    needs_presence: bool,
    selector: CodebookSelector<'a>,
}

#[derive(Clone)]
pub(crate) struct BlockStreamGenerator<'a> {
    params: &'a ParameterSet,
    reads: &'a [SequencedRead],
    assignment: &'a BlockAssignment,
    paired: bool,
    stats: PairingStats,
    tid: Option<usize>,
}
impl<'a> BlockStreamGenerator<'a> {
    pub fn new(
        params: &'a ParameterSet,
        reads: &'a [SequencedRead],
        assignment: &'a BlockAssignment,
        paired: bool,
    ) -> Self {
        Self {
            params,
            reads,
            assignment,
            paired,
            stats: PairingStats::default(),
            tid: None,
        }
    }

    pub fn stats(&self) -> PairingStats {
        self.stats
    }

    fn alphabet(&self) -> &'a Alphabet {
        self.params.alphabet()
    }

    fn block_class(&self, plan: &BlockPlan) -> ClassId {
        plan.records
            .iter()
            .flat_map(|r| r.reads.iter())
            .filter_map(|&i| self.reads[i].alignment.as_ref())
            .map(super::ReadAlignment::class)
            .max()
            .unwrap_or(ClassId::U)
    }

    fn generate(&mut self, block_index: usize, plan: &BlockPlan) -> Result<AccessUnit> {
        let class = self.block_class(plan);
        let read_indices = plan.records.iter().flat_map(|r| r.reads.iter().copied());

        let reference = if class == ClassId::U {
            None
        } else {
            block_reference(self.reads, read_indices.clone(), self.alphabet())?
        };
        let (start, end, runs) = match reference {
            Some(r) => match r.runs {
                Some(runs) if !runs.is_empty() => (runs[0].position, r.end, runs),
                _ => (0, r.end, Vec::new()),
            },
            None => (0, 0, Vec::new()),
        };

        let qv = self.params.qv();
        let mut state = BlockState {
            streams: DescriptorStreamSet::new(),
            class,
            previous: start,
            cursor: end,
            has_flags: read_indices
                .clone()
                .any(|i| self.reads[i].flags & 0b111 != 0),
            needs_presence: qv.enabled()
                && read_indices.clone().any(|i| self.reads[i].qualities.is_empty()),
            selector: CodebookSelector::new(qv, class),
        };

        // the first run starts at `start`
        let mut run_end = start;
        for (i, run) in runs.iter().enumerate() {
            if i > 0 {
                state.streams.push(POS_ADDITIONAL, run.position - run_end);
            }
            self.push_literal(&mut state.streams, &run.bases)?;
            run_end = run.end();
        }

        for (record_index, record) in plan.records.iter().enumerate() {
            self.encode_record(&mut state, block_index, record_index, record)
                .map_err(|e| e.in_record(block_index, record_index))?;
        }

        let header = AccessUnitHeader::new(class, block_index as u64, plan.num_records() as u64)
            .with_span(start, end)
            .with_reference_runs(runs.len() as u64);
        debug!(
            tid = ?self.tid,
            block = block_index,
            class = ?class,
            records = plan.num_records(),
            reference_runs = runs.len(),
            values = state.streams.total_values(),
            "generated block streams"
        );
        Ok(AccessUnit::new(header, state.streams))
    }

    /// Literal entry: record type, length and bases of an unmapped sequence
    fn push_literal(&self, streams: &mut DescriptorStreamSet, bases: &[u8]) -> Result<()> {
        streams.push(RTYPE, RTYPE_LITERAL);
        streams.push(RLEN, bases.len() as u64 - 1);
        self.push_bases(streams, UREADS, bases)
    }

    fn push_bases(
        &self,
        streams: &mut DescriptorStreamSet,
        subseq: SubSeq,
        bases: &[u8],
    ) -> Result<()> {
        for &base in bases {
            streams.push(subseq, self.symbol(base)?);
        }
        Ok(())
    }

    fn symbol(&self, base: u8) -> Result<u64> {
        self.alphabet()
            .encode(base)
            .ok_or_else(|| RecordShapeError::UnknownSymbol(char::from(base)).into())
    }

    fn encode_record(
        &mut self,
        state: &mut BlockState<'_>,
        block_index: usize,
        record_index: usize,
        record: &PlannedRecord,
    ) -> Result<()> {
        let reads: Vec<&SequencedRead> = record.reads.iter().map(|&i| &self.reads[i]).collect();
        let mapped = state.class != ClassId::U;
        let noisy = mapped
            && reads
                .iter()
                .filter_map(|r| r.alignment.as_ref())
                .any(|a| !a.noise.is_empty());

        // placements; unmapped segments of mapped classes become literals
        let mut placements = Vec::with_capacity(reads.len());
        if mapped {
            for read in &reads {
                let placement = match &read.alignment {
                    Some(a) => SegmentPlacement {
                        position: a.position,
                        reverse: a.reverse,
                    },
                    None => {
                        let bases = read.sequence.as_deref().unwrap_or_default();
                        self.push_literal(&mut state.streams, bases)?;
                        let position = state.cursor;
                        state.cursor += read.length;
                        SegmentPlacement {
                            position,
                            reverse: false,
                        }
                    }
                };
                placements.push(placement);
            }

            state
                .streams
                .push(RTYPE, if noisy { RTYPE_NOISE } else { RTYPE_PERFECT });
        }

        if state.class == ClassId::I {
            self.push_clips(&mut state.streams, record_index, &reads)?;
        }

        if self.params.read_length() == 0 {
            for read in &reads {
                state.streams.push(RLEN, read.length - 1);
            }
        }

        if let Some(first) = placements.first() {
            state
                .streams
                .push(POS_FIRST, first.position.wrapping_sub(state.previous));
            state.previous = first.position;
        }

        if self.paired {
            let case = self.pairing_case(block_index, record_index, record, &placements, &reads);
            case.push(&mut state.streams);
        }

        for placement in &placements {
            state.streams.push(RCOMP, u64::from(placement.reverse));
        }

        if self.params.num_groups() > 0 {
            state
                .streams
                .push(RGROUP, reads[0].read_group.unwrap_or(0));
        }

        if mapped {
            for read in &reads {
                for depth in 0..usize::from(self.params.as_depth()) {
                    let score = read.mapping_scores.get(depth).copied().unwrap_or(0);
                    state.streams.push(MSCORE, score);
                }
            }
        }

        if state.has_flags {
            for (bit, subseq) in FLAGS.iter().enumerate() {
                state
                    .streams
                    .push(*subseq, u64::from((reads[0].flags >> bit) & 1));
            }
        }

        if noisy {
            for read in &reads {
                self.push_noise(&mut state.streams, read)?;
            }
        }

        if !mapped {
            for read in &reads {
                self.push_bases(
                    &mut state.streams,
                    UREADS,
                    read.sequence.as_deref().unwrap_or_default(),
                )?;
            }
        }

        self.push_qualities(state, &reads, &placements)
    }

    fn push_clips(
        &self,
        streams: &mut DescriptorStreamSet,
        record_index: usize,
        reads: &[&SequencedRead],
    ) -> Result<()> {
        let clipped = reads
            .iter()
            .filter_map(|r| r.alignment.as_ref())
            .any(|a| !a.clips.is_empty());
        if !clipped {
            return Ok(());
        }

        streams.push(CLIPS_RECORD_ID, record_index as u64);
        for (segment, read) in reads.iter().enumerate() {
            let Some(alignment) = &read.alignment else {
                continue;
            };
            let forward = read.forward_bases(self.alphabet());
            let segment_bit = if segment == 0 { 0 } else { CLIP_SEGMENT_BIT };
            for (side, clip) in [(0, alignment.clips.left), (CLIP_RIGHT_BIT, alignment.clips.right)] {
                match clip {
                    Clip::None => {}
                    Clip::Soft(len) => {
                        streams.push(CLIPS_TYPE, segment_bit | side);
                        let len = len as usize;
                        let range = if side == 0 {
                            0..len
                        } else {
                            read.length as usize - len..read.length as usize
                        };
                        match &forward {
                            Some(bases) => {
                                self.push_bases(streams, CLIPS_SOFT_STRING, &bases[range])?;
                            }
                            None => {
                                let n = self.symbol(b'N')?;
                                range.for_each(|_| streams.push(CLIPS_SOFT_STRING, n));
                            }
                        }
                        streams.push(CLIPS_SOFT_STRING, self.alphabet().size() as u64);
                    }
                    Clip::Hard(len) => {
                        streams.push(CLIPS_TYPE, CLIP_HARD_BIT | segment_bit | side);
                        streams.push(CLIPS_HARD_LENGTH, len);
                    }
                }
            }
        }
        streams.push(CLIPS_TYPE, CLIP_END);
        Ok(())
    }

    fn push_noise(&self, streams: &mut DescriptorStreamSet, read: &SequencedRead) -> Result<()> {
        let Some(alignment) = &read.alignment else {
            // literal segment: empty list
            streams.push(MMPOS_TERMINATOR, 1);
            return Ok(());
        };
        let mut previous: Option<u64> = None;
        for noise in &alignment.noise {
            streams.push(MMPOS_TERMINATOR, 0);
            let gap = match previous {
                Some(p) => noise.column - p - 1,
                None => noise.column,
            };
            streams.push(MMPOS_POSITION, gap);
            streams.push(MMTYPE_TYPE, noise.kind.type_id());
            match noise.kind {
                NoiseKind::Substitution { base, reference } => {
                    streams.push_with_dependency(
                        MMTYPE_SUBSTITUTION,
                        self.symbol(base)?,
                        self.symbol(reference)?,
                    );
                }
                NoiseKind::Insertion(base) => streams.push(MMTYPE_INSERTION, self.symbol(base)?),
                NoiseKind::Deletion => {}
            }
            previous = Some(noise.column);
        }
        streams.push(MMPOS_TERMINATOR, 1);
        Ok(())
    }

    fn pairing_case(
        &mut self,
        block_index: usize,
        record_index: usize,
        record: &PlannedRecord,
        placements: &[SegmentPlacement],
        reads: &[&SequencedRead],
    ) -> PairingCase {
        let owner = record.reads[0];
        let num_reads = self.reads.len();
        let is_read1 = owner < num_reads / 2;
        let current = (block_index as u64, record_index as u64);

        if record.reads.len() == 2 {
            self.stats.same_record += 1;
            let delta = match placements {
                [first, second] => second.position.wrapping_sub(first.position),
                // unmapped class: the mate literal follows the owner's bases
                _ => reads[0].length,
            };
            return PairingCase::classify(current, current, is_read1, delta);
        }

        let mate = self.assignment.location(mate_of(owner, num_reads));
        if mate.0 == current.0 {
            self.stats.split_same_block += 1;
        } else {
            self.stats.split_other_block += 1;
        }
        PairingCase::classify(current, mate, is_read1, 0)
    }

    fn push_qualities(
        &self,
        state: &mut BlockState<'_>,
        reads: &[&SequencedRead],
        placements: &[SegmentPlacement],
    ) -> Result<()> {
        let qv = self.params.qv();
        if !qv.enabled() {
            return Ok(());
        }
        for (segment, read) in reads.iter().enumerate() {
            let present = !read.qualities.is_empty();
            if state.needs_presence {
                state.streams.push(QV_PRESENT, u64::from(present));
            }
            if !present {
                continue;
            }

            let layout = match placements.get(segment) {
                Some(placement) => {
                    let clips = read.alignment.as_ref().map(|a| a.clips).unwrap_or_default();
                    QualityLayout {
                        left_soft: clips.left.soft_len(),
                        splices: vec![SpliceSpan {
                            position: placement.position,
                            length: read.length - clips.soft_len(),
                            reverse: placement.reverse,
                        }],
                        right_soft: clips.right.soft_len(),
                        unmapped: 0,
                    }
                }
                None => QualityLayout::unmapped(read.length),
            };
            let origins: Vec<BaseOrigin> = layout.origins();

            let reverse = placements.get(segment).is_some_and(|p| p.reverse);
            for strand in &read.qualities {
                // stored order starts from reference-forward orientation
                let mut stored = strand.clone();
                if reverse {
                    stored.reverse();
                }
                if qv.reverse {
                    layout.reverse_chunks(&mut stored);
                }
                for (origin, &quality) in origins.iter().zip(&stored) {
                    let codebook =
                        state
                            .selector
                            .select_for_encoding(*origin, quality, &mut state.streams);
                    let symbol = qv.codebooks[codebook]
                        .quantize(quality)
                        .ok_or(ConfigError::EmptyCodebook(codebook))?;
                    state.streams.push(qv_symbols(codebook), symbol);
                }
            }
        }
        Ok(())
    }
}
impl BlockProcessor for BlockStreamGenerator<'_> {
    type Input = BlockPlan;
    type Output = AccessUnit;

    fn process_block(&mut self, block_index: usize, input: &BlockPlan) -> Result<AccessUnit> {
        self.generate(block_index, input)
    }

    fn set_tid(&mut self, tid: usize) {
        self.tid = Some(tid);
    }

    fn get_tid(&self) -> Option<usize> {
        self.tid
    }
}
