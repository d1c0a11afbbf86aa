//! Quality-value layout shared by the encoder and decoder
//!
//! Both sides walk the quality symbols of a segment in stored order and ask
//! the same [`CodebookSelector`] which codebook applies to each position, so
//! the codebook-id side channel (`QV[1]`) is produced and consumed in lockstep.

use std::collections::HashMap;

use crate::error::{Result, StreamError};
use crate::params::QvParameters;

use super::{ClassId, DescriptorStreamSet, QV_CODEBOOK};

/// Where a stored quality position sits relative to the alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseOrigin {
    /// Soft-clipped base or base of an unmapped segment
    Unaligned,
    /// Aligned base at this (virtual) reference position
    Aligned(u64),
}

/// One aligned stretch of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceSpan {
    pub position: u64,
    pub length: u64,
    pub reverse: bool,
}

/// Read layout used to place quality values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityLayout {
    pub left_soft: u64,
    pub splices: Vec<SpliceSpan>,
    pub right_soft: u64,
    /// Bases when the segment is unmapped
    pub unmapped: u64,
}
impl QualityLayout {
    #[must_use]
    pub fn unmapped(length: u64) -> Self {
        Self {
            unmapped: length,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.splices
            .iter()
            .fold(self.unmapped.saturating_add(self.left_soft), |n, s| {
                n.saturating_add(s.length)
            })
            .saturating_add(self.right_soft)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Origin of every stored position
    #[must_use]
    pub fn origins(&self) -> Vec<BaseOrigin> {
        let mut origins = Vec::with_capacity(self.len() as usize);
        let unaligned = (self.unmapped + self.left_soft) as usize;
        origins.extend(std::iter::repeat_n(BaseOrigin::Unaligned, unaligned));
        for splice in &self.splices {
            origins.extend(
                (0..splice.length).map(|o| BaseOrigin::Aligned(splice.position.wrapping_add(o))),
            );
        }
        origins.extend(std::iter::repeat_n(
            BaseOrigin::Unaligned,
            self.right_soft as usize,
        ));
        origins
    }

    /// Reverses, in place, every chunk whose splice is reverse-complemented
    ///
    /// Chunks follow the splices, the left soft clip joining the first one
    /// and the right soft clip the last one. Applying it twice is a no-op.
    pub fn reverse_chunks(&self, qualities: &mut [u8]) {
        let last = self.splices.len().saturating_sub(1);
        let mut offset = self.unmapped as usize;
        for (idx, splice) in self.splices.iter().enumerate() {
            let mut len = splice.length as usize;
            if idx == 0 {
                len += self.left_soft as usize;
            }
            if idx == last {
                len += self.right_soft as usize;
            }
            let end = (offset + len).min(qualities.len());
            if splice.reverse {
                qualities[offset..end].reverse();
            }
            offset = end;
        }
    }
}

enum Choice {
    Fixed(usize),
    ByPosition(u64),
}

/// Picks the codebook of every quality value
///
/// - class U: codebook 0
/// - classes I/HM, base outside of the alignment: the last codebook
/// - more than one aligned codebook: the first quality seen at a base
///   position picks the aligned codebook that reconstructs it most closely
///   (lowest id on ties); the id is written to `QV[1]` once and every later
///   quality at that position in the block uses the same codebook
/// - otherwise codebook 0
pub struct CodebookSelector<'a> {
    qv: &'a QvParameters,
    class: ClassId,
    ids: HashMap<u64, usize>,
}
impl<'a> CodebookSelector<'a> {
    #[must_use]
    pub fn new(qv: &'a QvParameters, class: ClassId) -> Self {
        Self {
            qv,
            class,
            ids: HashMap::new(),
        }
    }

    fn choice(&self, origin: BaseOrigin) -> Choice {
        match (self.class, origin) {
            (ClassId::U, _) => Choice::Fixed(0),
            (ClassId::I | ClassId::HM, BaseOrigin::Unaligned) => {
                Choice::Fixed(self.qv.codebooks.len().saturating_sub(1))
            }
            (_, BaseOrigin::Aligned(pos)) if self.qv.aligned_codebooks(self.class) > 1 => {
                Choice::ByPosition(pos)
            }
            _ => Choice::Fixed(0),
        }
    }

    /// Aligned codebook with the smallest reconstruction error for `quality`
    fn best_fit(&self, quality: u8) -> usize {
        (0..self.qv.aligned_codebooks(self.class))
            .min_by_key(|&cb| self.qv.codebooks[cb].distortion(quality).unwrap_or(u8::MAX))
            .unwrap_or(0)
    }

    /// Encoder side: new positions pick their codebook from `quality` and
    /// announce it in `QV[1]`
    pub fn select_for_encoding(
        &mut self,
        origin: BaseOrigin,
        quality: u8,
        streams: &mut DescriptorStreamSet,
    ) -> usize {
        match self.choice(origin) {
            Choice::Fixed(cb) => cb,
            Choice::ByPosition(pos) => {
                if let Some(&cb) = self.ids.get(&pos) {
                    return cb;
                }
                let cb = self.best_fit(quality);
                streams.push(QV_CODEBOOK, cb as u64);
                self.ids.insert(pos, cb);
                cb
            }
        }
    }

    /// Decoder side: new positions pop their codebook id from `QV[1]`
    pub fn select_for_decoding(
        &mut self,
        origin: BaseOrigin,
        streams: &mut DescriptorStreamSet,
    ) -> Result<usize> {
        match self.choice(origin) {
            Choice::Fixed(cb) => Ok(cb),
            Choice::ByPosition(pos) => {
                if let Some(&cb) = self.ids.get(&pos) {
                    return Ok(cb);
                }
                let id = streams.pop(QV_CODEBOOK)?;
                let limit = self.qv.aligned_codebooks(self.class);
                let cb = usize::try_from(id)
                    .ok()
                    .filter(|&cb| cb < limit)
                    .ok_or(StreamError::SymbolOutOfRange {
                        subseq: QV_CODEBOOK,
                        value: id,
                        limit,
                    })?;
                self.ids.insert(pos, cb);
                Ok(cb)
            }
        }
    }
}
