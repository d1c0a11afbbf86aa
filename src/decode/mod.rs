//! Read-stream decoder
//!
//! Every access unit is decoded on its own: the streams are cloned and
//! rewound, records are reconstructed in order and handed to a [`RecordSink`],
//! and the unit must be fully consumed once its last record is out.

mod record;
mod restore;
mod unit;

pub use record::{Alignment, GenomicRecord, RecordSegment, SegmentAlignment, SpliceAlignment};
pub use restore::{DecodedRead, restore_read_order};

use auto_impl::auto_impl;
use tracing::{debug, info};

use crate::core::AccessUnit;
use crate::error::Result;
use crate::parallel::{BlockProcessor, process_blocks_parallel};
use crate::params::ParameterSet;

use unit::UnitDecoder;

/// Receives decoded records in block and record order
#[auto_impl(&mut, Box)]
pub trait RecordSink {
    fn push(&mut self, block_index: usize, record_index: usize, record: GenomicRecord)
    -> Result<()>;

    /// Called once all records of a block were pushed and the block was fully consumed
    fn on_block_complete(&mut self, _block_index: usize) -> Result<()> {
        Ok(())
    }
}
impl RecordSink for Vec<GenomicRecord> {
    fn push(
        &mut self,
        _block_index: usize,
        _record_index: usize,
        record: GenomicRecord,
    ) -> Result<()> {
        Vec::push(self, record);
        Ok(())
    }
}

/// Rebuilds genomic records from access units
#[derive(Debug, Clone, Copy)]
pub struct ReadStreamDecoder<'a> {
    params: &'a ParameterSet,
    reference: Option<&'a [u8]>,
    msar: &'a [Vec<String>],
}
impl<'a> ReadStreamDecoder<'a> {
    #[must_use]
    pub fn new(params: &'a ParameterSet) -> Self {
        Self {
            params,
            reference: None,
            msar: &[],
        }
    }

    /// External reference for blocks that do not embed their own
    ///
    /// Without it, aligned bases of such blocks are reported as unknown.
    #[must_use]
    pub fn with_reference(mut self, reference: &'a [u8]) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Per block: one auxiliary token for every secondary alignment, in record order
    #[must_use]
    pub fn with_msar(mut self, msar: &'a [Vec<String>]) -> Self {
        self.msar = msar;
        self
    }

    /// Decodes one access unit into `sink`
    pub fn decode_access_unit<S: RecordSink>(&self, unit: &AccessUnit, mut sink: S) -> Result<()> {
        let block_index = unit.header.block_index as usize;
        let msar = self.msar.get(block_index).map_or(&[][..], Vec::as_slice);
        let mut decoder = UnitDecoder::new(self.params, unit, self.reference, msar)
            .map_err(|e| e.in_block(block_index))?;

        for record_index in 0..unit.num_records() {
            let record = decoder
                .decode_record(record_index)
                .map_err(|e| e.in_record(block_index, record_index))?;
            sink.push(block_index, record_index, record)?;
        }
        decoder.finish().map_err(|e| e.in_block(block_index))?;

        debug!(
            block = block_index,
            records = unit.num_records(),
            "decoded access unit"
        );
        sink.on_block_complete(block_index)
    }

    /// Decodes one access unit into a vector of records
    pub fn decode_records(&self, unit: &AccessUnit) -> Result<Vec<GenomicRecord>> {
        // every record consumes at least one value
        let mut records =
            Vec::with_capacity(unit.num_records().min(unit.streams.total_values()));
        self.decode_access_unit(unit, &mut records)?;
        Ok(records)
    }

    /// Decodes every access unit on up to `num_threads` threads (0 uses all cores)
    ///
    /// Records are returned per block, in block order.
    pub fn decode_all(
        &self,
        units: &[AccessUnit],
        num_threads: usize,
    ) -> Result<Vec<Vec<GenomicRecord>>> {
        let processor = UnitProcessor {
            decoder: *self,
            tid: None,
            decoded: 0,
        };
        let (blocks, workers) = process_blocks_parallel(&processor, units, num_threads)?;
        let records: usize = workers.iter().map(|w| w.decoded).sum();
        info!(
            blocks = blocks.len(),
            records,
            threads = workers.len(),
            "decoded access units"
        );
        Ok(blocks)
    }
}

#[derive(Clone)]
struct UnitProcessor<'a> {
    decoder: ReadStreamDecoder<'a>,
    tid: Option<usize>,
    decoded: usize,
}
impl BlockProcessor for UnitProcessor<'_> {
    type Input = AccessUnit;
    type Output = Vec<GenomicRecord>;

    fn process_block(&mut self, _block_index: usize, input: &AccessUnit) -> Result<Self::Output> {
        let records = self.decoder.decode_records(input)?;
        self.decoded += records.len();
        Ok(records)
    }

    fn set_tid(&mut self, tid: usize) {
        self.tid = Some(tid);
    }

    fn get_tid(&self) -> Option<usize> {
        self.tid
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::core::{
        AccessUnitHeader, CLIP_END, CLIP_HARD_BIT, CLIP_RIGHT_BIT, CLIPS_HARD_LENGTH,
        CLIPS_RECORD_ID, CLIPS_SOFT_STRING, CLIPS_TYPE, ClassId, Clip, DescriptorStreamSet,
        MMAP_MORE_ALIGNMENTS, MMAP_NEXT_POS, MMAP_NEXT_SEQ, MMAP_NUM_ALIGNMENTS, MMPOS_POSITION,
        MMPOS_TERMINATOR, MMTYPE_INSERTION, MMTYPE_SUBSTITUTION, MMTYPE_TYPE, Noise, PAIR_CASE,
        PAIR_SAME_REC, POS_ADDITIONAL, POS_FIRST, PairingCase, RCOMP, RLEN, RTYPE, UREADS,
        qv_symbols,
    };
    use crate::error::StreamError;
    use crate::params::{ParameterSetBuilder, QvParameters};

    fn unit(class: ClassId, records: u64, streams: DescriptorStreamSet) -> AccessUnit {
        let header = AccessUnitHeader::new(class, 0, records).with_span(0, u64::MAX);
        AccessUnit::new(header, streams)
    }

    fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default().qv(QvParameters::disabled())
    }

    fn single_end() -> ParameterSet {
        builder().build().expect("valid parameters")
    }

    #[test]
    fn test_aligned_block() -> crate::Result<()> {
        let params = single_end();
        let mut streams = DescriptorStreamSet::new();
        streams.insert(POS_FIRST, vec![100, 5, 100, 0]);
        streams.insert(RLEN, vec![9, 9, 9, 9]);
        streams.insert(RTYPE, vec![1, 1, 1, 1]);
        streams.insert(RCOMP, vec![0, 0, 1, 0]);
        let header = AccessUnitHeader::new(ClassId::P, 0, 4).with_span(0, 215);
        let au = AccessUnit::new(header, streams);

        let records = ReadStreamDecoder::new(&params).decode_records(&au)?;
        let positions: Vec<_> = records.iter().map(GenomicRecord::position).collect();
        assert_eq!(positions, vec![Some(100), Some(105), Some(205), Some(205)]);
        assert!(records.iter().all(|r| r.lengths() == vec![10]));
        assert!(records[2].is_reverse(0));
        // no reference available
        assert!(records.iter().all(|r| r.segments[0].bases.is_none()));
        Ok(())
    }

    #[test]
    fn test_external_reference_and_noise() -> crate::Result<()> {
        let params = single_end();
        let reference = b"AAAACCCCGGGGTTTT";
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![3]);
        streams.insert(RLEN, vec![5]);
        streams.insert(POS_FIRST, vec![2]);
        streams.insert(RCOMP, vec![0]);
        // substitution at column 1, insertion at column 3
        streams.insert(MMPOS_TERMINATOR, vec![0, 0, 1]);
        streams.insert(MMPOS_POSITION, vec![1, 1]);
        streams.insert(MMTYPE_TYPE, vec![0, 1]);
        streams.insert(MMTYPE_SUBSTITUTION, vec![3]);
        streams.insert(MMTYPE_INSERTION, vec![0]);
        let au = unit(ClassId::I, 1, streams);

        let records = ReadStreamDecoder::new(&params)
            .with_reference(reference)
            .decode_records(&au)?;
        let segment = &records[0].segments[0];
        // reference from 2: A A C C C ...
        assert_eq!(segment.bases.as_deref(), Some(&b"ATCACC"[..]));
        assert_eq!(segment.noise[0], Noise::substitution(1, b'T', b'A'));
        assert_eq!(segment.noise[1], Noise::insertion(3, b'A'));
        Ok(())
    }

    #[test]
    fn test_unmapped_block() -> crate::Result<()> {
        let params = single_end();
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RLEN, vec![3, 1]);
        streams.insert(UREADS, vec![0, 1, 2, 3, 4, 4]);
        let au = unit(ClassId::U, 2, streams);

        let records = ReadStreamDecoder::new(&params).decode_records(&au)?;
        assert_eq!(records[0].segments[0].bases.as_deref(), Some(&b"ACGT"[..]));
        assert_eq!(records[1].segments[0].bases.as_deref(), Some(&b"NN"[..]));
        assert!(records[0].alignments.is_empty());
        assert_eq!(records[1].position(), None);
        Ok(())
    }

    #[test]
    fn test_paired_same_record() -> crate::Result<()> {
        let params = builder()
            .template_segments(2)
            .build()?;
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1, 1]);
        streams.insert(RLEN, vec![3, 3, 3]);
        streams.insert(POS_FIRST, vec![50, 20]);
        streams.insert(PAIR_CASE, vec![0, 1]);
        streams.insert(PAIR_SAME_REC, vec![120 << 1]);
        streams.insert(crate::core::PAIR_R1_SPLIT, vec![0]);
        streams.insert(RCOMP, vec![0, 1, 0]);
        let au = unit(ClassId::P, 2, streams);

        let records = ReadStreamDecoder::new(&params).decode_records(&au)?;
        assert_eq!(records[0].num_segments(), 2);
        assert_eq!(records[0].segment_position(1), Some(170));
        assert!(records[0].is_reverse(1));
        assert_eq!(
            records[0].pairing,
            Some(PairingCase::SameRecord {
                read1_first: true,
                delta: 120
            })
        );
        assert_eq!(records[1].num_segments(), 1);
        assert_eq!(records[1].position(), Some(70));
        assert_eq!(records[1].pairing, Some(PairingCase::R1Split { mate_record: 0 }));
        Ok(())
    }

    #[test]
    fn test_half_mapped_record() -> crate::Result<()> {
        let params = builder()
            .template_segments(2)
            .build()?;
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![1, 2]);
        streams.insert(POS_FIRST, vec![10]);
        streams.insert(RCOMP, vec![0]);
        streams.insert(UREADS, vec![2, 2, 2]);
        let au = unit(ClassId::HM, 1, streams);

        let records = ReadStreamDecoder::new(&params)
            .with_reference(b"TTTTTTTTTTGAC")
            .decode_records(&au)?;
        let record = &records[0];
        assert_eq!(record.pairing, None);
        assert_eq!(record.segments[0].bases.as_deref(), Some(&b"GA"[..]));
        assert_eq!(record.segments[1].bases.as_deref(), Some(&b"GGG"[..]));
        assert_eq!(record.segment_position(1), None);
        Ok(())
    }

    #[test]
    fn test_clips_and_splices() -> crate::Result<()> {
        let params = builder()
            .spliced_reads(true)
            .build()?;
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(CLIPS_RECORD_ID, vec![0]);
        // left soft "GT", right hard 4
        streams.insert(CLIPS_TYPE, vec![0, CLIP_HARD_BIT | CLIP_RIGHT_BIT, CLIP_END]);
        streams.insert(CLIPS_SOFT_STRING, vec![2, 3, 5]);
        streams.insert(CLIPS_HARD_LENGTH, vec![4]);
        // length 8, splices of 2 and 4
        streams.insert(RLEN, vec![7, 2, 4]);
        streams.insert(POS_FIRST, vec![1]);
        streams.insert(POS_ADDITIONAL, vec![3]);
        streams.insert(RCOMP, vec![0, 0]);
        let au = unit(ClassId::I, 1, streams);

        let records = ReadStreamDecoder::new(&params)
            .with_reference(b"AACCGGTTAACC")
            .decode_records(&au)?;
        let segment = &records[0].segments[0];
        assert_eq!(segment.clips.left, Clip::Soft(2));
        assert_eq!(segment.clips.right, Clip::Hard(4));
        assert_eq!(segment.splice_lengths, vec![2, 4]);
        let splices = &records[0].alignments[0].segments[0].splices;
        assert_eq!(splices[0].position, Some(1));
        // 1 + 2 + gap 3
        assert_eq!(splices[1].position, Some(6));
        assert_eq!(segment.bases.as_deref(), Some(&b"GTACTTAA"[..]));
        Ok(())
    }

    #[test]
    fn test_splice_overrun() {
        let params = builder()
            .spliced_reads(true)
            .build()
            .expect("valid parameters");
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![4, 3, 3]);
        let au = unit(ClassId::I, 1, streams);
        let err = ReadStreamDecoder::new(&params).decode_records(&au).unwrap_err();
        assert!(err.is_record_shape_mismatch());
    }

    #[test]
    fn test_multiple_alignments_with_msar() -> crate::Result<()> {
        let params = builder()
            .multiple_alignments(true)
            .as_depth(1)
            .build()?;
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![9]);
        streams.insert(MMAP_NUM_ALIGNMENTS, vec![2]);
        streams.insert(MMAP_MORE_ALIGNMENTS, vec![1]);
        streams.insert(MMAP_NEXT_SEQ, vec![3]);
        streams.insert(MMAP_NEXT_POS, vec![4000]);
        streams.insert(POS_FIRST, vec![1000]);
        streams.insert(POS_ADDITIONAL, vec![250]);
        streams.insert(RCOMP, vec![0, 1]);
        streams.insert(crate::core::MSCORE, vec![60, 12]);
        let au = unit(ClassId::P, 1, streams);
        let msar = vec![vec!["10M".to_string()]];

        let records = ReadStreamDecoder::new(&params)
            .with_msar(&msar)
            .decode_records(&au)?;
        let record = &records[0];
        assert_eq!(record.alignments.len(), 2);
        assert_eq!(record.alignments[1].segments[0].position(), Some(1250));
        assert!(record.alignments[1].segments[0].is_reverse());
        assert_eq!(record.alignments[1].msar.as_deref(), Some("10M"));
        assert_eq!(record.scores(0), &[60]);
        assert_eq!(record.more_alignments, Some((3, 4000)));
        Ok(())
    }

    #[test]
    fn test_failures() {
        let params = single_end();

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![7]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::P, 1, streams))
            .unwrap_err();
        assert!(matches!(
            err.root(),
            crate::Error::StreamError(crate::error::StreamError::UnknownRecordType(7))
        ));
        assert!(matches!(
            err,
            crate::Error::InBlock {
                block_index: 0,
                record_index: Some(0),
                ..
            }
        ));

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![9]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::P, 1, streams))
            .unwrap_err();
        assert!(err.is_stream_exhausted());

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![9, 9]);
        streams.insert(POS_FIRST, vec![0]);
        streams.insert(RCOMP, vec![0]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::P, 1, streams))
            .unwrap_err();
        assert!(matches!(
            err.root(),
            crate::Error::StreamError(crate::error::StreamError::UnconsumedValues { .. })
        ));
    }

    #[test]
    fn test_corrupt_lengths() {
        let params = single_end();

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![u64::MAX]);
        streams.insert(POS_FIRST, vec![0]);
        streams.insert(RCOMP, vec![0]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::P, 1, streams))
            .unwrap_err();
        assert!(matches!(
            err.root(),
            crate::Error::StreamError(StreamError::ValueOverflow { subseq: RLEN, .. })
        ));

        // a length of u64::MAX bases with only two quality symbols
        let with_qualities = builder().qv(QvParameters::default()).build().expect("valid");
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![1]);
        streams.insert(RLEN, vec![u64::MAX - 1]);
        streams.insert(POS_FIRST, vec![0]);
        streams.insert(RCOMP, vec![0]);
        streams.insert(qv_symbols(0), vec![30, 30]);
        let err = ReadStreamDecoder::new(&with_qualities)
            .decode_records(&unit(ClassId::P, 1, streams))
            .unwrap_err();
        assert!(err.is_stream_exhausted());

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RLEN, vec![u64::MAX - 1]);
        streams.insert(UREADS, vec![0, 1]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::U, 1, streams))
            .unwrap_err();
        assert!(err.is_stream_exhausted());

        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![5]);
        streams.insert(RLEN, vec![u64::MAX - 1]);
        streams.insert(UREADS, vec![0, 1]);
        let header = AccessUnitHeader::new(ClassId::P, 0, 1)
            .with_span(0, u64::MAX)
            .with_reference_runs(1);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&AccessUnit::new(header, streams))
            .unwrap_err();
        assert!(err.is_stream_exhausted());
    }

    #[test]
    fn test_embedded_reference_runs() -> crate::Result<()> {
        let params = single_end();
        let mut streams = DescriptorStreamSet::new();
        // ACGT at 10, GG at 14 + 16
        streams.insert(RTYPE, vec![5, 5, 1, 1]);
        streams.insert(RLEN, vec![3, 1, 3, 1]);
        streams.insert(POS_ADDITIONAL, vec![16]);
        streams.insert(UREADS, vec![0, 1, 2, 3, 2, 2]);
        streams.insert(POS_FIRST, vec![0, 20]);
        streams.insert(RCOMP, vec![0, 0]);
        let header = AccessUnitHeader::new(ClassId::P, 0, 2)
            .with_span(10, 32)
            .with_reference_runs(2);
        let au = AccessUnit::new(header, streams);

        let records = ReadStreamDecoder::new(&params).decode_records(&au)?;
        assert_eq!(records[0].position(), Some(10));
        assert_eq!(records[0].segments[0].bases.as_deref(), Some(&b"ACGT"[..]));
        assert_eq!(records[1].position(), Some(30));
        assert_eq!(records[1].segments[0].bases.as_deref(), Some(&b"GG"[..]));
        Ok(())
    }

    #[test]
    fn test_reference_run_past_block_end() {
        let params = single_end();
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RTYPE, vec![5, 5]);
        streams.insert(RLEN, vec![1, 0]);
        streams.insert(POS_ADDITIONAL, vec![100]);
        streams.insert(UREADS, vec![0, 1, 2]);
        let header = AccessUnitHeader::new(ClassId::P, 0, 1)
            .with_span(10, 20)
            .with_reference_runs(2);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&AccessUnit::new(header, streams))
            .unwrap_err();
        assert!(matches!(
            err.root(),
            crate::Error::StreamError(StreamError::PositionOutOfRange { position: 112, .. })
        ));
    }

    #[test]
    fn test_computed_reference_rejected() {
        let params = builder()
            .computed_reference(1, true)
            .build()
            .expect("valid parameters");
        let mut streams = DescriptorStreamSet::new();
        streams.insert(RLEN, vec![0]);
        let err = ReadStreamDecoder::new(&params)
            .decode_records(&unit(ClassId::U, 1, streams))
            .unwrap_err();
        assert!(err.is_unsupported_configuration());
    }

    #[test]
    fn test_decode_all_keeps_block_order() -> crate::Result<()> {
        let params = single_end();
        let units: Vec<_> = (0..6u64)
            .map(|block| {
                let mut streams = DescriptorStreamSet::new();
                streams.insert(RTYPE, vec![1]);
                streams.insert(RLEN, vec![4]);
                streams.insert(POS_FIRST, vec![block * 10]);
                streams.insert(RCOMP, vec![0]);
                let header = AccessUnitHeader::new(ClassId::P, block, 1).with_span(0, 1000);
                AccessUnit::new(header, streams)
            })
            .collect();
        let blocks = ReadStreamDecoder::new(&params).decode_all(&units, 3)?;
        let positions: Vec<_> = blocks.iter().map(|b| b[0].position()).collect();
        assert_eq!(
            positions,
            vec![Some(0), Some(10), Some(20), Some(30), Some(40), Some(50)]
        );
        Ok(())
    }
}
