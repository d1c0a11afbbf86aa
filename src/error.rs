use crate::core::SubSeq;

/// Custom Result type for read-stream operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the library, encompassing every failure that can occur
/// while generating, transforming, serializing or consuming descriptor streams.
///
/// None of these errors are recoverable inside an access unit: positions and
/// pairing indices are carried from record to record, so the only sensible
/// reaction is to abandon the block and surface the error.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors raised while reading descriptor sub-sequences
    #[error("Error consuming descriptor streams: {0}")]
    StreamError(#[from] StreamError),

    /// Errors raised when a record does not have the shape its configuration requires
    #[error("Error in record shape: {0}")]
    RecordShapeError(#[from] RecordShapeError),

    /// Errors raised by the sub-sequence transforms
    #[error("Error in transform stream: {0}")]
    TransformError(#[from] TransformError),

    /// Errors raised for parameter combinations this crate does not implement
    #[error("Unsupported configuration: {0}")]
    ConfigError(#[from] ConfigError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// An error tied to a specific access unit (and record, when known)
    #[error("{}: {source}", location(*block_index, *record_index))]
    InBlock {
        block_index: usize,
        record_index: Option<usize>,
        source: Box<Error>,
    },
}

fn location(block_index: usize, record_index: Option<usize>) -> String {
    match record_index {
        Some(record) => format!("block {block_index}, record {record}"),
        None => format!("block {block_index}"),
    }
}

impl Error {
    /// Attach the block index to an error, keeping any location already present
    #[must_use]
    pub fn in_block(self, block_index: usize) -> Self {
        match self {
            Self::InBlock { .. } => self,
            other => Self::InBlock {
                block_index,
                record_index: None,
                source: Box::new(other),
            },
        }
    }

    /// Attach both block and record index to an error
    #[must_use]
    pub fn in_record(self, block_index: usize, record_index: usize) -> Self {
        match self {
            Self::InBlock { .. } => self,
            other => Self::InBlock {
                block_index,
                record_index: Some(record_index),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping location wrappers
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InBlock { source, .. } => source.root(),
            other => other,
        }
    }

    /// Checks if the error is a pop past the end of a sub-sequence
    ///
    /// # Returns
    ///
    /// * `true` if the root error is a `StreamError::StreamExhausted`
    /// * `false` for all other error types
    #[must_use]
    pub fn is_stream_exhausted(&self) -> bool {
        matches!(
            self.root(),
            Self::StreamError(StreamError::StreamExhausted { .. })
        )
    }

    /// Checks if the error comes from a malformed transform stream
    #[must_use]
    pub fn is_inconsistent_transform(&self) -> bool {
        matches!(self.root(), Self::TransformError(_))
    }

    /// Checks if the error comes from a record that does not fit its configuration
    #[must_use]
    pub fn is_record_shape_mismatch(&self) -> bool {
        matches!(self.root(), Self::RecordShapeError(_))
    }

    /// Checks if the error comes from an unsupported parameter combination
    #[must_use]
    pub fn is_unsupported_configuration(&self) -> bool {
        matches!(self.root(), Self::ConfigError(_))
    }
}

/// Errors that can occur while consuming the descriptor streams of an access unit
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// A value was requested from a sub-sequence whose cursor reached its end
    #[error("Sub-sequence {subseq} exhausted after {consumed} values")]
    StreamExhausted { subseq: SubSeq, consumed: usize },

    /// A sub-sequence still holds values after the access unit was fully decoded
    #[error("Sub-sequence {subseq} has {remaining} unconsumed values")]
    UnconsumedValues { subseq: SubSeq, remaining: usize },

    /// The record type value is not one the decoder knows
    #[error("Unknown record type: {0}")]
    UnknownRecordType(u64),

    /// The pairing decoding case is outside of the defined range
    #[error("Unknown pairing case: {0}")]
    UnknownPairingCase(u64),

    /// The mismatch type is outside of the defined range
    #[error("Unknown mismatch type: {0}")]
    UnknownMismatchType(u64),

    /// The clip type is outside of the defined range
    #[error("Unknown clip type: {0}")]
    UnknownClipType(u64),

    /// A symbol was decoded that does not exist in its table
    ///
    /// # Arguments
    /// * `subseq` - The sub-sequence the symbol was read from
    /// * `value` - The decoded value
    /// * `limit` - The number of valid symbols
    #[error("Symbol {value} from {subseq} is out of range ({limit} symbols)")]
    SymbolOutOfRange {
        subseq: SubSeq,
        value: u64,
        limit: usize,
    },

    /// A read references a virtual sequence position with no known bases
    #[error("Position {position} (length {length}) is outside of the known sequence")]
    PositionOutOfRange { position: u64, length: u64 },

    /// A decoded value overflows once added to the running position or length
    #[error("Value {value} from {subseq} overflows")]
    ValueOverflow { subseq: SubSeq, value: u64 },

    /// The access unit header magic does not match
    #[error("Invalid access unit magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// The access unit header carries an unknown alignment class
    #[error("Invalid alignment class id: {0}")]
    InvalidClassId(u8),

    /// The serialized payload is shorter than its declared size
    #[error("Payload truncated: expected {expected} bytes, found {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    /// A serialized payload names a transform this crate does not know
    #[error("Unknown transform tag: {0}")]
    UnknownTransform(u8),

    /// A record announces zero alignments
    #[error("Record declares zero alignments")]
    ZeroAlignments,

    /// A descriptor or sub-sequence id outside of the descriptor table
    #[error("Invalid sub-sequence id: descriptor {descriptor}, sub-sequence {subseq}")]
    InvalidSubSeqId { descriptor: u8, subseq: u8 },
}

/// Errors raised when a record disagrees with its declared shape
#[derive(thiserror::Error, Debug)]
pub enum RecordShapeError {
    /// The bases provided for a read do not match its declared length
    #[error("Read {index}: {attribute} has length {actual}, expected {expected}")]
    LengthMismatch {
        index: usize,
        attribute: &'static str,
        expected: u64,
        actual: u64,
    },

    /// A read needs its bases (unaligned reads are stored literally)
    #[error("Read {0} is unaligned but carries no bases")]
    MissingSequence(usize),

    /// Paired input must hold both mates of every pair
    #[error("Paired input requires an even number of reads, found {0}")]
    OddPairedInput(usize),

    /// A mismatch is placed outside of the aligned part of a read
    #[error("Read {index}: mismatch offset {offset} outside of aligned length {aligned}")]
    MismatchOutOfRange {
        index: usize,
        offset: u64,
        aligned: u64,
    },

    /// Mismatch offsets must be strictly increasing
    #[error("Read {index}: mismatch offsets are not strictly increasing")]
    UnorderedMismatches { index: usize },

    /// A base symbol is not part of the configured alphabet
    #[error("Read {index}: base {base:?} is not in the alphabet")]
    InvalidBase { index: usize, base: char },

    /// The number of mapping scores does not match the configured depth
    #[error("Read {index}: {actual} mapping scores given, depth is {expected}")]
    ScoreDepth {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// A quality value cannot be represented by any codebook entry
    #[error("Read {index}: quality {quality} cannot be represented")]
    QualityOutOfRange { index: usize, quality: u8 },

    /// A read group id beyond the configured number of groups
    #[error("Read {index}: read group {group} exceeds {num_groups} groups")]
    ReadGroupOutOfRange {
        index: usize,
        group: u64,
        num_groups: u64,
    },

    /// Splice lengths overshoot the read length they are meant to cover
    #[error("Splice lengths sum to {sum}, read length is {length}")]
    SpliceOverrun { sum: u64, length: u64 },

    /// A splice segment of length zero would never make progress
    #[error("Zero-length splice segment")]
    ZeroSpliceLength,

    /// Clipping removes more bases than the read holds
    #[error("Clips of {clipped} bases exceed read length {length}")]
    ClipOverrun { clipped: u64, length: u64 },

    /// A mismatch position points past the end of its segment
    #[error("Mismatch position {position} outside of segment length {length}")]
    MismatchPastSegment { position: u64, length: u64 },

    /// Reads must hold at least one base
    #[error("Read {0} has length zero")]
    EmptyRead(usize),

    /// Two aligned reads disagree on the reference base at a position
    #[error("Read {index}: reference base at position {position} conflicts with another read")]
    ReferenceConflict { index: usize, position: u64 },

    /// The base recorded by a substitution or insertion is not the base found in the read
    #[error("Read {index}: noise base at column {column} does not match the read")]
    NoiseBaseMismatch { index: usize, column: u64 },

    /// The aligned span of a read does not fit in the position range
    #[error("Read {index}: aligned span overflows the position range")]
    PositionOverflow { index: usize },

    /// A base outside of the alphabet reached the stream writer
    #[error("Base {0:?} is not in the alphabet")]
    UnknownSymbol(char),

    /// An original read index appears twice or outside of the read range
    #[error("Read index {0} is duplicated or out of range")]
    DuplicateReadIndex(u64),

    /// A side-channel index does not cover the decoded records
    #[error("Block {block}: index holds {actual} entries, {expected} segments decoded")]
    IndexMismatch {
        block: usize,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by the sub-sequence transforms when their streams disagree
#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    /// A literal was requested but the raw-values stream is empty or consumed
    #[error("Raw values exhausted after {0} values")]
    RawValuesExhausted(usize),

    /// A match was requested but the pointer stream is empty or consumed
    #[error("Pointers exhausted after {0} values")]
    PointersExhausted(usize),

    /// A pointer reaches before the start of the reconstructed sequence
    #[error("Pointer {pointer} reaches before the start of {available} decoded values")]
    InvalidPointer { pointer: u64, available: usize },

    /// A stream still holds values once the transform finished
    #[error("{stream} stream holds {remaining} unused values")]
    TrailingValues {
        stream: &'static str,
        remaining: usize,
    },

    /// A run-length sequence ended without its terminating chunk
    #[error("Run lengths ended before the run of value {0} was terminated")]
    UnterminatedRun(usize),

    /// The lookup table does not hold the given rank
    #[error("LUT rank {rank} exceeds table size {size}")]
    LutRankOutOfRange { rank: u64, size: usize },

    /// The transform received the wrong number of streams
    #[error("Expected {expected} transformed streams, found {actual}")]
    StreamCount { expected: usize, actual: usize },

    /// A decoded run or match length does not fit in memory
    #[error("Length {0} does not fit in memory")]
    LengthOverflow(u64),
}

/// Errors for parameter combinations this crate rejects rather than mis-decoding
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// RLE requires a guard of at least one
    #[error("RLE guard must be at least 1")]
    ZeroGuard,

    /// Blocks must hold at least one record
    #[error("num_reads_per_block must be at least 1")]
    ZeroBlockSize,

    /// Only one or two template segments are defined
    #[error("Number of template segments must be 1 or 2, found {0}")]
    TemplateSegments(u8),

    /// The alphabet identifier is unknown
    #[error("Unknown alphabet id: {0}")]
    AlphabetId(u8),

    /// The computed-reference algorithm cannot be combined with class U
    #[error("Computed reference algorithm {0} is not supported")]
    ComputedReference(u8),

    /// More codebooks than QV sub-sequence ids are available
    #[error("At most {max} QV codebooks are supported, found {found}")]
    TooManyCodebooks { max: usize, found: usize },

    /// A codebook without reconstruction values
    #[error("QV codebook {0} is empty")]
    EmptyCodebook(usize),

    /// Quality depth must be at least one when codebooks are configured
    #[error("QV depth must be at least 1")]
    ZeroQvDepth,

    /// The encoder does not produce spliced or multiple-alignment streams
    #[error("Encoding with {0} is not supported")]
    EncoderFeature(&'static str),

    /// The input reads disagree with the configured template segment count
    #[error("Parameter set declares {declared} template segments but input is {found}")]
    PairingMismatch { declared: u8, found: &'static str },

    /// A transform was configured for a sub-sequence outside of the table
    #[error("No transform slot for descriptor {descriptor}, sub-sequence {subseq}")]
    TransformSlot { descriptor: u8, subseq: u8 },
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::core::{DescriptorId, SubSeq};

    #[test]
    fn test_location_wrapping_keeps_first_location() {
        let err: Error = StreamError::UnknownRecordType(9).into();
        let err = err.in_record(3, 7).in_block(5);
        match &err {
            Error::InBlock {
                block_index,
                record_index,
                ..
            } => {
                assert_eq!(*block_index, 3);
                assert_eq!(*record_index, Some(7));
            }
            _ => panic!("expected location wrapper"),
        }
        assert!(err.to_string().contains("block 3, record 7"));
    }

    #[test]
    fn test_classification_sees_through_wrappers() {
        let err: Error = StreamError::StreamExhausted {
            subseq: SubSeq::new(DescriptorId::Pos, 0),
            consumed: 2,
        }
        .into();
        let err = err.in_block(1);
        assert!(err.is_stream_exhausted());
        assert!(!err.is_inconsistent_transform());

        let err: Error = TransformError::RawValuesExhausted(0).into();
        assert!(err.is_inconsistent_transform());

        let err: Error = ConfigError::ZeroGuard.into();
        assert!(err.is_unsupported_configuration());

        let err: Error = RecordShapeError::OddPairedInput(3).into();
        assert!(err.is_record_shape_mismatch());
    }
}
