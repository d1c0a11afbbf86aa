//! Assignment of reads to genomic records and blocks
//!
//! Single-end input is cut into contiguous blocks. Paired-end input is scanned
//! in original order: mates are merged into one record when both are aligned
//! close together in the same block, otherwise each mate becomes its own
//! record and the pair is linked through the pairing case.

use tracing::debug;

use crate::error::{RecordShapeError, Result};
use crate::MAX_SAME_RECORD_DELTA;

use super::SequencedRead;

/// One genomic record: original read indices, first segment first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannedRecord {
    pub reads: Vec<usize>,
}

/// Records of one block in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPlan {
    pub records: Vec<PlannedRecord>,
}
impl BlockPlan {
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    /// Original read indices in the order their segments are emitted
    #[must_use]
    pub fn quality_order(&self) -> Vec<u64> {
        self.records
            .iter()
            .flat_map(|r| r.reads.iter().map(|&i| i as u64))
            .collect()
    }

    /// One identifier index per record: the smaller index of the pair
    #[must_use]
    pub fn id_order(&self, paired: bool, num_reads: usize) -> Vec<u64> {
        self.records
            .iter()
            .map(|r| {
                let first = r.reads[0];
                let id = if paired {
                    first.min(mate_of(first, num_reads))
                } else {
                    first
                };
                id as u64
            })
            .collect()
    }

    fn push(&mut self, reads: Vec<usize>) -> usize {
        self.records.push(PlannedRecord { reads });
        self.records.len() - 1
    }
}

/// Blocks plus the location of every read
#[derive(Debug, Clone, Default)]
pub struct BlockAssignment {
    pub blocks: Vec<BlockPlan>,
    /// Block holding each original read
    pub block_of: Vec<usize>,
    /// Record (within its block) holding each original read
    pub record_of: Vec<usize>,
}
impl BlockAssignment {
    fn with_reads(num_reads: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_of: vec![usize::MAX; num_reads],
            record_of: vec![usize::MAX; num_reads],
        }
    }

    fn place(&mut self, block: &mut BlockPlan, reads: Vec<usize>) {
        let block_index = self.blocks.len();
        for &read in &reads {
            self.block_of[read] = block_index;
        }
        let record = block.push(reads);
        for &read in &block.records[record].reads {
            self.record_of[read] = record;
        }
    }

    /// (block, record) of a read
    #[must_use]
    pub fn location(&self, read: usize) -> (u64, u64) {
        (self.block_of[read] as u64, self.record_of[read] as u64)
    }
}

/// Index of the mate of read `index` among `num_reads` paired reads
///
/// The first half of the input holds read 1 of every pair, the second half read 2.
#[must_use]
pub fn mate_of(index: usize, num_reads: usize) -> usize {
    let half = num_reads / 2;
    if index < half {
        index + half
    } else {
        index - half
    }
}

/// Contiguous blocks of `block_size` reads, one record per read
#[must_use]
pub fn assign_single_end(num_reads: usize, block_size: usize) -> BlockAssignment {
    let mut assignment = BlockAssignment::with_reads(num_reads);
    for start in (0..num_reads).step_by(block_size.max(1)) {
        let mut block = BlockPlan::default();
        for read in start..(start + block_size).min(num_reads) {
            assignment.place(&mut block, vec![read]);
        }
        assignment.blocks.push(block);
    }
    assignment
}

/// Paired-end record and block assignment
///
/// Blocks close after `block_size` records. Unaligned mates of aligned reads
/// are held back and appended to the block being closed, which may then
/// exceed `block_size`.
pub fn assign_paired_end(reads: &[SequencedRead], block_size: usize) -> Result<BlockAssignment> {
    let num_reads = reads.len();
    if num_reads % 2 != 0 {
        return Err(RecordShapeError::OddPairedInput(num_reads).into());
    }

    let mut assignment = BlockAssignment::with_reads(num_reads);
    let mut seen = vec![false; num_reads];
    let mut block = BlockPlan::default();
    let mut deferred = Vec::new();

    for current in 0..num_reads {
        if seen[current] {
            continue;
        }
        seen[current] = true;
        let mate = mate_of(current, num_reads);

        if seen[mate] {
            if can_merge(&assignment, reads, current, mate) {
                let record = assignment.record_of[mate];
                block.records[record].reads.push(current);
                assignment.block_of[current] = assignment.blocks.len();
                assignment.record_of[current] = record;
                continue;
            }
            assignment.place(&mut block, vec![current]);
        } else {
            match (reads[current].is_aligned(), reads[mate].is_aligned()) {
                (false, false) => {
                    seen[mate] = true;
                    assignment.place(&mut block, vec![current, mate]);
                }
                (true, false) => {
                    seen[mate] = true;
                    assignment.place(&mut block, vec![current]);
                    deferred.push(mate);
                }
                // mate is placed when the scan reaches it
                _ => assignment.place(&mut block, vec![current]),
            }
        }

        if block.num_records() >= block_size {
            close_block(&mut assignment, &mut block, &mut deferred);
        }
    }
    if !block.records.is_empty() || !deferred.is_empty() {
        close_block(&mut assignment, &mut block, &mut deferred);
    }

    debug!(
        reads = num_reads,
        blocks = assignment.blocks.len(),
        "assigned paired reads"
    );
    Ok(assignment)
}

/// Both mates aligned, in the current block, and close enough for one record
fn can_merge(
    assignment: &BlockAssignment,
    reads: &[SequencedRead],
    current: usize,
    mate: usize,
) -> bool {
    if assignment.block_of[mate] != assignment.blocks.len() {
        return false;
    }
    match (reads[mate].position(), reads[current].position()) {
        (Some(first), Some(second)) => {
            second >= first && second - first < MAX_SAME_RECORD_DELTA
        }
        _ => false,
    }
}

fn close_block(assignment: &mut BlockAssignment, block: &mut BlockPlan, deferred: &mut Vec<usize>) {
    for read in std::mem::take(deferred) {
        assignment.place(block, vec![read]);
    }
    assignment.blocks.push(std::mem::take(block));
}
