//! # mpegg-streams
//!
//! Read-stream generation and consumption for MPEG-G style genomic access units,
//! together with the generic integer transforms applied to each descriptor
//! sub-sequence before entropy coding.
//!
//! ## Pipeline
//!
//! ```text
//!  reads ──► ReadStreamEncoder ──► AccessUnit (DescriptorStreamSet per block)
//!                                       │
//!                                       ▼ SubSeqTransform + zstd
//!                                  serialized payloads
//!                                       │
//!  records ◄── ReadStreamDecoder ◄── AccessUnit
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mpegg_streams::{
//!     ParameterSetBuilder, ReadStreamDecoder, ReadStreamEncoder, ReadAlignment, SequencedRead,
//! };
//!
//! let params = ParameterSetBuilder::default()
//!     .num_reads_per_block(4)
//!     .build()
//!     .unwrap();
//!
//! let reads: Vec<_> = [100u64, 105, 205, 205]
//!     .iter()
//!     .map(|&pos| SequencedRead::new(10).with_alignment(ReadAlignment::new(pos)))
//!     .collect();
//!
//! let dataset = ReadStreamEncoder::new(params.clone()).encode(&reads).unwrap();
//! let records = ReadStreamDecoder::new(&params)
//!     .decode_records(&dataset.access_units[0])
//!     .unwrap();
//! assert_eq!(records[2].position(), Some(205));
//! ```

pub mod alphabet;
pub mod core;
pub mod decode;
pub mod encode;
pub mod error;
pub mod parallel;
pub mod params;
pub mod simulate;
pub mod transform;

pub use alphabet::{Alphabet, AlphabetId};
pub use crate::core::{
    AccessUnit, AccessUnitHeader, Clip, Clips, ClassId, DescriptorId, DescriptorStreamSet, Noise,
    NoiseKind, PairingCase, SubSeq,
};
pub use decode::{
    DecodedRead, GenomicRecord, ReadStreamDecoder, RecordSink, RecordSegment, restore_read_order,
};
pub use encode::{EncodedDataset, PairingStats, ReadAlignment, ReadStreamEncoder, SequencedRead};
pub use error::{Error, Result};
pub use parallel::{BlockProcessor, process_blocks_parallel};
pub use params::{Codebook, ParameterSet, ParameterSetBuilder, QvParameters};
pub use transform::SubSeqTransform;

/// Magic bytes opening every serialized access unit
pub const ACCESS_UNIT_MAGIC: &[u8; 4] = b"MGAU";

/// Pairs whose mapping positions differ by this much or more are never merged
/// into a single genomic record
pub const MAX_SAME_RECORD_DELTA: u64 = 32_768;

/// Default number of genomic records per access unit
pub const DEFAULT_READS_PER_BLOCK: usize = 10_000;

/// Default zstd level used when serializing payloads
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
