//! Reference span and embedded reference of a block
//!
//! The reference is rebuilt from the aligned reads themselves: matched bases
//! are copied, substitutions contribute their original reference base and
//! insertions are skipped. Only positions covered by some read are embedded,
//! as one run per stretch of overlapping or touching reads, so a block whose
//! reads lie far apart stores no bases for the gap between them. Covered
//! positions no read knows the base of (only deletions, or reads without
//! bases) are filled with `N`.

use crate::alphabet::Alphabet;
use crate::core::NoiseKind;
use crate::error::{RecordShapeError, Result};

use super::SequencedRead;

/// Contiguous stretch of embedded reference bases
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReferenceRun {
    pub position: u64,
    pub bases: Vec<u8>,
}
impl ReferenceRun {
    /// One past the last position of the run
    pub fn end(&self) -> u64 {
        self.position + self.bases.len() as u64
    }
}

/// Aligned span of a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockReference {
    /// One past the largest aligned reference base
    pub end: u64,
    /// Covered runs in position order, when any aligned read carries bases
    pub runs: Option<Vec<ReferenceRun>>,
}

/// Span and embedded reference of the given reads, `None` without aligned reads
pub(crate) fn block_reference(
    reads: &[SequencedRead],
    indices: impl Iterator<Item = usize> + Clone,
    alphabet: &Alphabet,
) -> Result<Option<BlockReference>> {
    let mut spans = Vec::new();
    let mut with_bases = false;
    for index in indices.clone() {
        let read = &reads[index];
        if let Some(alignment) = &read.alignment {
            let start = alignment.position;
            spans.push((start, start + alignment.reference_length(read.length)));
            with_bases |= read.sequence.is_some();
        }
    }
    spans.sort_unstable();

    let mut covered: Vec<(u64, u64)> = Vec::new();
    for (start, end) in spans {
        match covered.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => covered.push((start, end)),
        }
    }
    let Some(&(_, end)) = covered.last() else {
        return Ok(None);
    };
    if !with_bases {
        return Ok(Some(BlockReference { end, runs: None }));
    }

    let mut cells: Vec<(u64, Vec<Option<u8>>)> = covered
        .iter()
        .filter(|(s, e)| e > s)
        .map(|&(s, e)| (s, vec![None; (e - s) as usize]))
        .collect();
    for index in indices {
        let read = &reads[index];
        let (Some(alignment), Some(forward)) = (&read.alignment, read.forward_bases(alphabet))
        else {
            continue;
        };
        if alignment.reference_length(read.length) == 0 {
            continue;
        }
        // every non-empty read span lies inside exactly one run
        let run = cells.partition_point(|(s, _)| *s <= alignment.position) - 1;
        let (run_start, run_cells) = &mut cells[run];
        let base_offset = alignment.position - *run_start;

        let mut set = |offset: u64, base: u8| -> Result<()> {
            let cell = &mut run_cells[(base_offset + offset) as usize];
            match *cell {
                Some(known) if known != base => Err(RecordShapeError::ReferenceConflict {
                    index,
                    position: alignment.position + offset,
                }
                .into()),
                _ => {
                    *cell = Some(base);
                    Ok(())
                }
            }
        };

        let aligned_end = (read.length - alignment.clips.right.soft_len()) as usize;
        let mut events = alignment.noise.iter().peekable();
        let mut read_offset = alignment.clips.left.soft_len() as usize;
        let mut ref_offset = 0;
        let mut column = 0;
        while read_offset < aligned_end {
            match events.next_if(|n| n.column == column).map(|n| n.kind) {
                Some(NoiseKind::Substitution { reference, .. }) => {
                    set(ref_offset, reference)?;
                    read_offset += 1;
                    ref_offset += 1;
                }
                Some(NoiseKind::Insertion(_)) => read_offset += 1,
                Some(NoiseKind::Deletion) => ref_offset += 1,
                None => {
                    set(ref_offset, forward[read_offset])?;
                    read_offset += 1;
                    ref_offset += 1;
                }
            }
            column += 1;
        }
    }

    let runs = cells
        .into_iter()
        .map(|(position, cells)| ReferenceRun {
            position,
            bases: cells.into_iter().map(|c| c.unwrap_or(b'N')).collect(),
        })
        .collect();
    Ok(Some(BlockReference {
        end,
        runs: Some(runs),
    }))
}
