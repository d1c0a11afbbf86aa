//! Read-stream encoder
//!
//! Reads arrive in original order. They are assigned to blocks (sequentially,
//! since paired-end assignment carries state from read to read), then every
//! block is turned into an [`AccessUnit`] in parallel.
//!
//! ```text
//!  reads ─► validate ─► assign blocks ─► ┌ block 0 ─► AccessUnit ┐
//!                                        │ block 1 ─► AccessUnit │─► EncodedDataset
//!                                        └ ...                   ┘
//! ```

mod block;
mod generate;
mod read;
mod reference;

pub use block::{BlockAssignment, BlockPlan, PlannedRecord, assign_paired_end, assign_single_end, mate_of};
pub use read::{ReadAlignment, SequencedRead};

use std::ops::AddAssign;

use tracing::info;

use crate::core::AccessUnit;
use crate::error::{ConfigError, Result};
use crate::parallel::process_blocks_parallel;
use crate::params::ParameterSet;

use generate::BlockStreamGenerator;

/// Pairing topology counts accumulated while generating streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingStats {
    /// Records holding both mates
    pub same_record: u64,
    /// Records whose mate is another record of the same block
    pub split_same_block: u64,
    /// Records whose mate lives in another block
    pub split_other_block: u64,
}
impl AddAssign for PairingStats {
    fn add_assign(&mut self, rhs: Self) {
        self.same_record += rhs.same_record;
        self.split_same_block += rhs.split_same_block;
        self.split_other_block += rhs.split_other_block;
    }
}

/// Output of the encoder
#[derive(Debug, Clone, Default)]
pub struct EncodedDataset {
    /// One access unit per block, in block order
    pub access_units: Vec<AccessUnit>,
    /// Per block: original read indices in emission order
    pub quality_index: Vec<Vec<u64>>,
    /// Per block: one identifier index per genomic record
    pub id_index: Vec<Vec<u64>>,
    pub stats: PairingStats,
}
impl EncodedDataset {
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.access_units.len()
    }
}

/// Turns ordered reads into one access unit per block
#[derive(Debug, Clone)]
pub struct ReadStreamEncoder {
    params: ParameterSet,
    num_threads: usize,
}
impl ReadStreamEncoder {
    #[must_use]
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            num_threads: 0,
        }
    }

    /// Set the number of worker threads (0 uses all cores)
    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    #[must_use]
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Encodes single-end or paired-end reads according to the template
    /// segment count of the parameter set
    ///
    /// The reference bases of a block are rebuilt from its aligned reads, so
    /// reads sharing a reference position must agree on the base there (read
    /// base, or the reference base of a substitution). A disagreement fails
    /// with `RecordShapeError::ReferenceConflict`.
    pub fn encode(&self, reads: &[SequencedRead]) -> Result<EncodedDataset> {
        if self.params.is_paired() {
            self.encode_paired_end(reads)
        } else {
            self.encode_single_end(reads)
        }
    }

    pub fn encode_single_end(&self, reads: &[SequencedRead]) -> Result<EncodedDataset> {
        self.check_supported(false)?;
        read::validate_reads(reads, &self.params)?;

        let assignment = assign_single_end(reads.len(), self.params.num_reads_per_block());
        self.generate(reads, &assignment, false)
    }

    /// Encodes paired reads where the mate of read `i` is [`mate_of`]`(i, n)`
    pub fn encode_paired_end(&self, reads: &[SequencedRead]) -> Result<EncodedDataset> {
        self.check_supported(true)?;
        read::validate_reads(reads, &self.params)?;

        let assignment = assign_paired_end(reads, self.params.num_reads_per_block())?;
        self.generate(reads, &assignment, true)
    }

    fn check_supported(&self, paired: bool) -> Result<()> {
        if paired != self.params.is_paired() {
            return Err(ConfigError::PairingMismatch {
                declared: self.params.template_segments(),
                found: if paired { "paired" } else { "single-end" },
            }
            .into());
        }
        if self.params.spliced_reads() {
            return Err(ConfigError::EncoderFeature("spliced reads").into());
        }
        if self.params.multiple_alignments() {
            return Err(ConfigError::EncoderFeature("multiple alignments").into());
        }
        if self.params.crps_flag() || self.params.cr_alg_id() != 0 {
            return Err(ConfigError::EncoderFeature("computed references").into());
        }
        Ok(())
    }

    fn generate(
        &self,
        reads: &[SequencedRead],
        assignment: &BlockAssignment,
        paired: bool,
    ) -> Result<EncodedDataset> {
        let generator = BlockStreamGenerator::new(&self.params, reads, assignment, paired);
        let (access_units, workers) =
            process_blocks_parallel(&generator, &assignment.blocks, self.num_threads)?;

        let mut stats = PairingStats::default();
        for worker in &workers {
            stats += worker.stats();
        }

        let quality_index = assignment
            .blocks
            .iter()
            .map(BlockPlan::quality_order)
            .collect();
        let id_index = assignment
            .blocks
            .iter()
            .map(|b| b.id_order(paired, reads.len()))
            .collect();

        info!(
            reads = reads.len(),
            blocks = access_units.len(),
            same_record = stats.same_record,
            split_same_block = stats.split_same_block,
            split_other_block = stats.split_other_block,
            "encoded read streams"
        );

        Ok(EncodedDataset {
            access_units,
            quality_index,
            id_index,
            stats,
        })
    }
}
