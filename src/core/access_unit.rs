//! Access units and their byte serialization
//!
//! ```text
//!  ┌──────────────────────────┐
//!  │ AccessUnitHeader (56 B)  │  magic, class, block, records, span, #runs, #payloads
//!  ├──────────────────────────┤
//!  │ payload (descriptor, sub-sequence)                     ─┐
//!  │   u8 descriptor | u8 subseq | u8 transform | u64 param  │ one per non-empty
//!  │   per transformed stream:                               │ sub-sequence, in
//!  │     u64 #values | u64 #bytes | zstd(LE u64 values)      │ table order
//!  ├──────────────────────────┤                             ─┘
//!  │ ...                      │
//!  └──────────────────────────┘
//! ```
//!
//! This is a compact stand-in for the container format, enough to move the
//! descriptor streams through a file and back.

use std::io::{self, Read, Write};

use bytemuck::{Pod, Zeroable};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::{Result, StreamError};
use crate::params::ParameterSet;
use crate::transform::SubSeqTransform;
use crate::ACCESS_UNIT_MAGIC;

use super::{ClassId, DescriptorStreamSet, SubSeq};

/// Size of the serialized header in bytes
pub const SIZE_HEADER: usize = std::mem::size_of::<AccessUnitHeader>();

#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct AccessUnitHeader {
    magic: [u8; 4],
    class_id: u8,
    padding: [u8; 3],

    /// Index of the block in the dataset
    pub block_index: u64,
    /// Number of genomic records (literal entries excluded)
    pub num_records: u64,
    /// Origin of the first position delta and of the embedded reference
    pub start_position: u64,
    /// First virtual position of the unaligned literal region
    pub end_position: u64,
    /// Leading literal entries that hold embedded reference runs
    pub reference_runs: u64,

    // number of payload entries following the header
    num_payloads: u64,
}
impl AccessUnitHeader {
    #[must_use]
    pub fn new(class: ClassId, block_index: u64, num_records: u64) -> Self {
        Self {
            magic: *ACCESS_UNIT_MAGIC,
            class_id: class as u8,
            padding: [0; 3],
            block_index,
            num_records,
            start_position: 0,
            end_position: 0,
            reference_runs: 0,
            num_payloads: 0,
        }
    }

    #[must_use]
    pub fn with_span(mut self, start_position: u64, end_position: u64) -> Self {
        self.start_position = start_position;
        self.end_position = end_position;
        self
    }

    #[must_use]
    pub fn with_reference_runs(mut self, runs: u64) -> Self {
        self.reference_runs = runs;
        self
    }

    pub fn class(&self) -> Result<ClassId> {
        ClassId::from_u8(self.class_id)
    }

    #[must_use]
    pub fn reference_embedded(&self) -> bool {
        self.reference_runs > 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SIZE_HEADER {
            return Err(StreamError::TruncatedPayload {
                expected: SIZE_HEADER,
                actual: bytes.len(),
            }
            .into());
        }
        let header: Self = bytemuck::pod_read_unaligned(&bytes[..SIZE_HEADER]);
        if header.magic != *ACCESS_UNIT_MAGIC {
            return Err(StreamError::InvalidMagic(header.magic).into());
        }
        header.class()?;
        Ok(header)
    }
}

/// One block of genomic records as descriptor sub-sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub header: AccessUnitHeader,
    pub streams: DescriptorStreamSet,
}
impl AccessUnit {
    #[must_use]
    pub fn new(header: AccessUnitHeader, streams: DescriptorStreamSet) -> Self {
        Self { header, streams }
    }

    pub fn class(&self) -> Result<ClassId> {
        self.header.class()
    }

    #[must_use]
    pub fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    /// Serialized payload of every non-empty sub-sequence in table order
    pub fn payloads(&self, params: &ParameterSet, level: i32) -> Result<Vec<(SubSeq, Vec<u8>)>> {
        self.streams
            .iter()
            .map(|(subseq, stream)| {
                let mut buf = Vec::new();
                write_payload(
                    &mut buf,
                    subseq,
                    stream.values(),
                    params.transform(subseq),
                    level,
                )?;
                Ok((subseq, buf))
            })
            .collect()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W, params: &ParameterSet, level: i32) -> Result<()> {
        let payloads = self.payloads(params, level)?;

        let mut header = self.header;
        header.num_payloads = payloads.len() as u64;
        writer.write_all(header.as_bytes())?;
        for (_, payload) in &payloads {
            writer.write_all(payload)?;
        }

        debug!(
            block = self.header.block_index,
            payloads = payloads.len(),
            bytes = payloads.iter().map(|(_, p)| p.len()).sum::<usize>(),
            "wrote access unit"
        );
        Ok(())
    }

    /// Reads the next access unit, `None` at end of input
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut buf = [0u8; SIZE_HEADER];
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let header = AccessUnitHeader::from_bytes(&buf)?;

        let mut streams = DescriptorStreamSet::new();
        for _ in 0..header.num_payloads {
            let (subseq, values) = read_payload(reader)?;
            streams.insert(subseq, values);
        }
        Ok(Some(Self::new(header, streams)))
    }
}

fn write_payload<W: Write>(
    writer: &mut W,
    subseq: SubSeq,
    values: &[u64],
    transform: SubSeqTransform,
    level: i32,
) -> Result<()> {
    let (tag, param) = transform.tag();
    writer.write_u8(subseq.descriptor as u8)?;
    writer.write_u8(subseq.index)?;
    writer.write_u8(tag)?;
    writer.write_u64::<LittleEndian>(param)?;

    let mut raw = Vec::new();
    let mut compressed = Vec::new();
    for stream in transform.forward(values)? {
        raw.resize(stream.len() * 8, 0);
        LittleEndian::write_u64_into(&stream, &mut raw);

        compressed.clear();
        zstd::stream::copy_encode(raw.as_slice(), &mut compressed, level)?;

        writer.write_u64::<LittleEndian>(stream.len() as u64)?;
        writer.write_u64::<LittleEndian>(compressed.len() as u64)?;
        writer.write_all(&compressed)?;
    }
    Ok(())
}

fn read_payload<R: Read>(reader: &mut R) -> Result<(SubSeq, Vec<u64>)> {
    let descriptor = reader.read_u8()?;
    let index = reader.read_u8()?;
    let subseq = SubSeq::from_ids(descriptor, index)?;
    let tag = reader.read_u8()?;
    let param = reader.read_u64::<LittleEndian>()?;
    let transform = SubSeqTransform::from_tag(tag, param)?;

    let mut compressed = Vec::new();
    let mut raw = Vec::new();
    let mut streams = Vec::with_capacity(transform.num_streams());
    for _ in 0..transform.num_streams() {
        let num_values = reader.read_u64::<LittleEndian>()? as usize;
        let num_bytes = reader.read_u64::<LittleEndian>()? as usize;

        compressed.resize(num_bytes, 0);
        reader.read_exact(&mut compressed)?;

        raw.clear();
        zstd::stream::copy_decode(compressed.as_slice(), &mut raw)?;
        if raw.len() != num_values * 8 {
            return Err(StreamError::TruncatedPayload {
                expected: num_values * 8,
                actual: raw.len(),
            }
            .into());
        }

        let mut values = vec![0u64; num_values];
        LittleEndian::read_u64_into(&raw, &mut values);
        streams.push(values);
    }
    Ok((subseq, transform.inverse(&streams)?))
}
