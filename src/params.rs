//! Encoding parameters shared by the encoder and decoder
//!
//! A [`ParameterSet`] is normally built through [`ParameterSetBuilder`]:
//!
//! ```rust
//! use mpegg_streams::{AlphabetId, ParameterSetBuilder};
//!
//! let params = ParameterSetBuilder::default()
//!     .num_reads_per_block(1000)
//!     .alphabet(AlphabetId::Iupac)
//!     .template_segments(2)
//!     .read_length(150)
//!     .build()
//!     .unwrap();
//! assert!(params.is_paired());
//! ```

use std::collections::BTreeMap;

use crate::alphabet::{Alphabet, AlphabetId};
use crate::core::{
    ClassId, MAX_QV_CODEBOOKS, MMPOS_TERMINATOR, RLEN, RTYPE, SubSeq, UREADS,
    qv_symbols,
};
use crate::error::{ConfigError, Result};
use crate::transform::SubSeqTransform;
use crate::DEFAULT_READS_PER_BLOCK;

/// Offset of the printable Phred range
const PHRED_OFFSET: u8 = 33;
/// Number of printable Phred values (`!` to `~`)
const PHRED_SYMBOLS: u8 = 94;

/// Quality reconstruction table
///
/// Symbol `i` decodes to `recon[i]`; encoding picks the nearest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebook {
    recon: Vec<u8>,
}
impl Codebook {
    #[must_use]
    pub fn new(recon: Vec<u8>) -> Self {
        Self { recon }
    }

    /// Lossless codebook over printable Phred+33 qualities
    #[must_use]
    pub fn phred() -> Self {
        Self::new((0..PHRED_SYMBOLS).map(|i| PHRED_OFFSET + i).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recon.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recon.is_empty()
    }

    #[must_use]
    pub fn reconstruct(&self, symbol: u64) -> Option<u8> {
        usize::try_from(symbol)
            .ok()
            .and_then(|idx| self.recon.get(idx).copied())
    }

    /// Symbol of the nearest reconstruction value (lowest symbol on ties)
    #[must_use]
    pub fn quantize(&self, quality: u8) -> Option<u64> {
        self.recon
            .iter()
            .enumerate()
            .min_by_key(|(idx, r)| (r.abs_diff(quality), *idx))
            .map(|(idx, _)| idx as u64)
    }

    /// Distance between a quality and its reconstruction, `None` when empty
    #[must_use]
    pub fn distortion(&self, quality: u8) -> Option<u8> {
        self.quantize(quality)
            .and_then(|symbol| self.reconstruct(symbol))
            .map(|recon| recon.abs_diff(quality))
    }
}
impl Default for Codebook {
    fn default() -> Self {
        Self::phred()
    }
}

/// Quality-value parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QvParameters {
    /// Quality strings per segment
    pub depth: u8,
    /// Store qualities of reverse-complemented splices reversed
    pub reverse: bool,
    /// Codebooks; empty disables qualities
    pub codebooks: Vec<Codebook>,
}
impl Default for QvParameters {
    fn default() -> Self {
        Self {
            depth: 1,
            reverse: false,
            codebooks: vec![Codebook::phred()],
        }
    }
}
impl QvParameters {
    /// Parameters that carry no quality values
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            depth: 0,
            reverse: false,
            codebooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.depth > 0 && !self.codebooks.is_empty()
    }

    /// Number of codebooks available for aligned bases of a class
    ///
    /// Classes I and HM reserve the last codebook for bases outside of the
    /// alignment.
    #[must_use]
    pub fn aligned_codebooks(&self, class: ClassId) -> usize {
        let n = self.codebooks.len();
        if class.has_clips() && n > 1 { n - 1 } else { n }
    }
}

/// Configuration constants consulted by the encoder and decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    num_reads_per_block: usize,
    alphabet: Alphabet,
    read_length: u64,
    template_segments: u8,
    spliced_reads: bool,
    multiple_alignments: bool,
    as_depth: u8,
    qv: QvParameters,
    num_groups: u64,
    cr_alg_id: u8,
    crps_flag: bool,
    transforms: BTreeMap<SubSeq, SubSeqTransform>,
}
impl ParameterSet {
    #[must_use]
    pub fn num_reads_per_block(&self) -> usize {
        self.num_reads_per_block
    }

    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Fixed read length, 0 when lengths vary per read
    #[must_use]
    pub fn read_length(&self) -> u64 {
        self.read_length
    }

    #[must_use]
    pub fn template_segments(&self) -> u8 {
        self.template_segments
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.template_segments == 2
    }

    #[must_use]
    pub fn spliced_reads(&self) -> bool {
        self.spliced_reads
    }

    #[must_use]
    pub fn multiple_alignments(&self) -> bool {
        self.multiple_alignments
    }

    /// Number of mapping scores per aligned segment
    #[must_use]
    pub fn as_depth(&self) -> u8 {
        self.as_depth
    }

    #[must_use]
    pub fn qv(&self) -> &QvParameters {
        &self.qv
    }

    #[must_use]
    pub fn num_groups(&self) -> u64 {
        self.num_groups
    }

    #[must_use]
    pub fn cr_alg_id(&self) -> u8 {
        self.cr_alg_id
    }

    #[must_use]
    pub fn crps_flag(&self) -> bool {
        self.crps_flag
    }

    /// Transform configured for a sub-sequence
    #[must_use]
    pub fn transform(&self, subseq: SubSeq) -> SubSeqTransform {
        self.transforms.get(&subseq).copied().unwrap_or_default()
    }
}
impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            num_reads_per_block: DEFAULT_READS_PER_BLOCK,
            alphabet: Alphabet::default(),
            read_length: 0,
            template_segments: 1,
            spliced_reads: false,
            multiple_alignments: false,
            as_depth: 0,
            qv: QvParameters::default(),
            num_groups: 0,
            cr_alg_id: 0,
            crps_flag: false,
            transforms: default_transforms(),
        }
    }
}

/// Transforms applied when nothing else is configured
fn default_transforms() -> BTreeMap<SubSeq, SubSeqTransform> {
    let mut transforms = BTreeMap::new();
    transforms.insert(RTYPE, SubSeqTransform::Equality);
    transforms.insert(RLEN, SubSeqTransform::Rle { guard: 255 });
    transforms.insert(MMPOS_TERMINATOR, SubSeqTransform::Rle { guard: 255 });
    transforms.insert(UREADS, SubSeqTransform::Match { window: 1024 });
    for codebook in 0..MAX_QV_CODEBOOKS {
        transforms.insert(qv_symbols(codebook), SubSeqTransform::Lut);
    }
    transforms
}

/// Builder for [`ParameterSet`]
#[derive(Debug, Clone)]
pub struct ParameterSetBuilder {
    num_reads_per_block: usize,
    alphabet_id: AlphabetId,
    read_length: u64,
    template_segments: u8,
    spliced_reads: bool,
    multiple_alignments: bool,
    as_depth: u8,
    qv: QvParameters,
    num_groups: u64,
    cr_alg_id: u8,
    crps_flag: bool,
    transforms: BTreeMap<SubSeq, SubSeqTransform>,
}
impl Default for ParameterSetBuilder {
    fn default() -> Self {
        Self {
            num_reads_per_block: DEFAULT_READS_PER_BLOCK,
            alphabet_id: AlphabetId::default(),
            read_length: 0,
            template_segments: 1,
            spliced_reads: false,
            multiple_alignments: false,
            as_depth: 0,
            qv: QvParameters::default(),
            num_groups: 0,
            cr_alg_id: 0,
            crps_flag: false,
            transforms: default_transforms(),
        }
    }
}
impl ParameterSetBuilder {
    #[must_use]
    pub fn num_reads_per_block(mut self, n: usize) -> Self {
        self.num_reads_per_block = n;
        self
    }

    #[must_use]
    pub fn alphabet(mut self, id: AlphabetId) -> Self {
        self.alphabet_id = id;
        self
    }

    /// Set a fixed read length (0 for variable lengths)
    #[must_use]
    pub fn read_length(mut self, len: u64) -> Self {
        self.read_length = len;
        self
    }

    #[must_use]
    pub fn template_segments(mut self, n: u8) -> Self {
        self.template_segments = n;
        self
    }

    #[must_use]
    pub fn spliced_reads(mut self, spliced: bool) -> Self {
        self.spliced_reads = spliced;
        self
    }

    #[must_use]
    pub fn multiple_alignments(mut self, multiple: bool) -> Self {
        self.multiple_alignments = multiple;
        self
    }

    #[must_use]
    pub fn as_depth(mut self, depth: u8) -> Self {
        self.as_depth = depth;
        self
    }

    #[must_use]
    pub fn qv(mut self, qv: QvParameters) -> Self {
        self.qv = qv;
        self
    }

    #[must_use]
    pub fn num_groups(mut self, n: u64) -> Self {
        self.num_groups = n;
        self
    }

    #[must_use]
    pub fn computed_reference(mut self, cr_alg_id: u8, crps_flag: bool) -> Self {
        self.cr_alg_id = cr_alg_id;
        self.crps_flag = crps_flag;
        self
    }

    /// Override the transform of one sub-sequence
    #[must_use]
    pub fn transform(mut self, subseq: SubSeq, transform: SubSeqTransform) -> Self {
        self.transforms.insert(subseq, transform);
        self
    }

    /// Apply no transform to any sub-sequence
    #[must_use]
    pub fn no_transforms(mut self) -> Self {
        self.transforms.clear();
        self
    }

    pub fn build(self) -> Result<ParameterSet> {
        if self.num_reads_per_block == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        if !(1..=2).contains(&self.template_segments) {
            return Err(ConfigError::TemplateSegments(self.template_segments).into());
        }
        if self.qv.codebooks.len() > MAX_QV_CODEBOOKS {
            return Err(ConfigError::TooManyCodebooks {
                max: MAX_QV_CODEBOOKS,
                found: self.qv.codebooks.len(),
            }
            .into());
        }
        if let Some(idx) = self.qv.codebooks.iter().position(Codebook::is_empty) {
            return Err(ConfigError::EmptyCodebook(idx).into());
        }
        if !self.qv.codebooks.is_empty() && self.qv.depth == 0 {
            return Err(ConfigError::ZeroQvDepth.into());
        }
        for (subseq, transform) in &self.transforms {
            if subseq.index >= subseq.descriptor.num_subseqs() {
                return Err(ConfigError::TransformSlot {
                    descriptor: subseq.descriptor as u8,
                    subseq: subseq.index,
                }
                .into());
            }
            if matches!(transform, SubSeqTransform::Rle { guard: 0 }) {
                return Err(ConfigError::ZeroGuard.into());
            }
        }

        Ok(ParameterSet {
            num_reads_per_block: self.num_reads_per_block,
            alphabet: Alphabet::new(self.alphabet_id),
            read_length: self.read_length,
            template_segments: self.template_segments,
            spliced_reads: self.spliced_reads,
            multiple_alignments: self.multiple_alignments,
            as_depth: self.as_depth,
            qv: self.qv,
            num_groups: self.num_groups,
            cr_alg_id: self.cr_alg_id,
            crps_flag: self.crps_flag,
            transforms: self.transforms,
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_builder_defaults() -> crate::Result<()> {
        let params = ParameterSetBuilder::default().build()?;
        assert_eq!(params.num_reads_per_block(), DEFAULT_READS_PER_BLOCK);
        assert_eq!(params.alphabet().id(), AlphabetId::Acgtn);
        assert!(!params.is_paired());
        assert_eq!(params.transform(RLEN), SubSeqTransform::Rle { guard: 255 });
        assert_eq!(
            params.transform(crate::core::POS_FIRST),
            SubSeqTransform::None
        );
        Ok(())
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let err = ParameterSetBuilder::default()
            .num_reads_per_block(0)
            .build()
            .unwrap_err();
        assert!(err.is_unsupported_configuration());

        assert!(
            ParameterSetBuilder::default()
                .template_segments(3)
                .build()
                .is_err()
        );

        let qv = QvParameters {
            depth: 1,
            reverse: false,
            codebooks: vec![Codebook::phred(); 7],
        };
        assert!(ParameterSetBuilder::default().qv(qv).build().is_err());

        assert!(
            ParameterSetBuilder::default()
                .transform(RLEN, SubSeqTransform::Rle { guard: 0 })
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_codebook_quantization() {
        let phred = Codebook::phred();
        assert_eq!(phred.len(), 94);
        assert_eq!(phred.quantize(b'I'), Some(u64::from(b'I' - 33)));
        assert_eq!(phred.reconstruct(40), Some(73));

        let binned = Codebook::new(vec![35, 45, 60]);
        assert_eq!(binned.quantize(40), Some(0));
        assert_eq!(binned.quantize(41), Some(1));
        assert_eq!(binned.quantize(100), Some(2));
        assert_eq!(binned.reconstruct(3), None);
    }

    #[test]
    fn test_aligned_codebooks() {
        let qv = QvParameters {
            depth: 1,
            reverse: false,
            codebooks: vec![Codebook::phred(); 3],
        };
        assert_eq!(qv.aligned_codebooks(ClassId::M), 3);
        assert_eq!(qv.aligned_codebooks(ClassId::I), 2);
        assert_eq!(QvParameters::default().aligned_codebooks(ClassId::HM), 1);
    }
}
