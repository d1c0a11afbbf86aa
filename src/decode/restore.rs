use crate::core::{Clips, Noise};
use crate::error::{RecordShapeError, Result};

use super::GenomicRecord;

/// One read restored to its original position in the input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRead {
    pub length: u64,
    /// Sequenced orientation; `None` when the reference was not available
    pub sequence: Option<Vec<u8>>,
    pub qualities: Vec<Vec<u8>>,
    /// Primary position, `None` for unaligned reads
    pub position: Option<u64>,
    pub reverse: bool,
    pub clips: Clips,
    pub noise: Vec<Noise>,
    pub flags: u8,
    pub read_group: Option<u64>,
    pub mapping_scores: Vec<u64>,
}

/// Puts decoded segments back in original read order
///
/// `quality_index` holds, per block, the original index of every segment in
/// the order the records emit them.
pub fn restore_read_order(
    blocks: &[Vec<GenomicRecord>],
    quality_index: &[Vec<u64>],
) -> Result<Vec<DecodedRead>> {
    let num_reads: usize = quality_index.iter().map(Vec::len).sum();
    let mut slots: Vec<Option<DecodedRead>> = vec![None; num_reads];

    for (block, records) in blocks.iter().enumerate() {
        let index = quality_index.get(block).map_or(&[][..], Vec::as_slice);
        let num_segments: usize = records.iter().map(GenomicRecord::num_segments).sum();
        if num_segments != index.len() {
            return Err(RecordShapeError::IndexMismatch {
                block,
                expected: num_segments,
                actual: index.len(),
            }
            .into());
        }

        let segments = records
            .iter()
            .flat_map(|r| (0..r.num_segments()).map(move |s| (r, s)));
        for ((record, segment), &original) in segments.zip(index) {
            let slot = usize::try_from(original)
                .ok()
                .and_then(|i| slots.get_mut(i))
                .filter(|slot| slot.is_none())
                .ok_or(RecordShapeError::DuplicateReadIndex(original))?;
            *slot = Some(decoded_read(record, segment));
        }
    }
    if blocks.len() != quality_index.len() {
        return Err(RecordShapeError::IndexMismatch {
            block: blocks.len(),
            expected: 0,
            actual: quality_index.get(blocks.len()).map_or(0, Vec::len),
        }
        .into());
    }

    Ok(slots.into_iter().flatten().collect())
}

fn decoded_read(record: &GenomicRecord, segment: usize) -> DecodedRead {
    let decoded = &record.segments[segment];
    DecodedRead {
        length: decoded.length,
        sequence: decoded.bases.clone(),
        qualities: decoded.qualities.clone(),
        position: record.segment_position(segment),
        reverse: record.is_reverse(segment),
        clips: decoded.clips,
        noise: decoded.noise.clone(),
        flags: record.flags,
        read_group: record.read_group,
        mapping_scores: record.scores(segment).to_vec(),
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::decode::RecordSegment;

    fn record(lengths: &[u64]) -> GenomicRecord {
        GenomicRecord {
            segments: lengths
                .iter()
                .map(|&length| RecordSegment {
                    length,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_restore_order() -> crate::Result<()> {
        let blocks = vec![
            vec![record(&[1]), record(&[2, 3])],
            vec![record(&[4])],
        ];
        let index = vec![vec![2, 0, 3], vec![1]];
        let reads = restore_read_order(&blocks, &index)?;
        let lengths: Vec<_> = reads.iter().map(|r| r.length).collect();
        assert_eq!(lengths, vec![2, 4, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_index_mismatch() {
        let blocks = vec![vec![record(&[1, 2])]];
        let err = restore_read_order(&blocks, &[vec![0]]).unwrap_err();
        assert!(err.is_record_shape_mismatch());
    }

    #[test]
    fn test_duplicate_index() {
        let blocks = vec![vec![record(&[1]), record(&[2])]];
        let err = restore_read_order(&blocks, &[vec![0, 0]]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::RecordShapeError(RecordShapeError::DuplicateReadIndex(0))
        ));
        let err = restore_read_order(&blocks, &[vec![0, 5]]).unwrap_err();
        assert!(err.is_record_shape_mismatch());
    }
}
