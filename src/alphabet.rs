//! Nucleotide alphabets
//!
//! An [`Alphabet`] is built once from the parameter set's alphabet id and then
//! passed by reference to the encoder and decoder. It maps bases to the symbol
//! ids written into `UREADS`, `MMTYPE` and `CLIPS`, and back.

use crate::error::{ConfigError, Result};

/// Marks a byte that is not part of the alphabet in the lookup table
const INVALID: u8 = u8::MAX;

const ACGTN: &[u8] = b"ACGTN";
const IUPAC: &[u8] = b"ACGTRYSWKMBDHVN-";

/// Alphabet selector as carried by the parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AlphabetId {
    /// `ACGTN`
    #[default]
    Acgtn = 0,
    /// The IUPAC ambiguity codes plus gap
    Iupac = 1,
}
impl AlphabetId {
    pub fn from_u8(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Acgtn),
            1 => Ok(Self::Iupac),
            _ => Err(ConfigError::AlphabetId(id).into()),
        }
    }
}

/// Immutable base/symbol lookup tables for one alphabet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    id: AlphabetId,
    symbols: &'static [u8],
    lookup: [u8; 256],
    complement: [u8; 256],
}
impl Alphabet {
    #[must_use]
    pub fn new(id: AlphabetId) -> Self {
        let symbols = match id {
            AlphabetId::Acgtn => ACGTN,
            AlphabetId::Iupac => IUPAC,
        };

        let mut lookup = [INVALID; 256];
        for (idx, &base) in symbols.iter().enumerate() {
            lookup[base as usize] = idx as u8;
        }

        let mut complement = [b'N'; 256];
        for (base, comp) in [
            (b'A', b'T'),
            (b'C', b'G'),
            (b'G', b'C'),
            (b'T', b'A'),
            (b'N', b'N'),
            (b'R', b'Y'),
            (b'Y', b'R'),
            (b'S', b'S'),
            (b'W', b'W'),
            (b'K', b'M'),
            (b'M', b'K'),
            (b'B', b'V'),
            (b'V', b'B'),
            (b'D', b'H'),
            (b'H', b'D'),
            (b'-', b'-'),
        ] {
            complement[base as usize] = comp;
        }

        Self {
            id,
            symbols,
            lookup,
            complement,
        }
    }

    #[must_use]
    pub fn id(&self) -> AlphabetId {
        self.id
    }

    /// Number of symbols in the alphabet
    ///
    /// Also used as the terminator of soft-clip strings.
    #[must_use]
    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn symbols(&self) -> &[u8] {
        self.symbols
    }

    /// Symbol id of a base, `None` if the base is not in the alphabet
    #[must_use]
    pub fn encode(&self, base: u8) -> Option<u64> {
        match self.lookup[base as usize] {
            INVALID => None,
            sym => Some(u64::from(sym)),
        }
    }

    /// Base for a symbol id, `None` if the id is out of range
    #[must_use]
    pub fn decode(&self, symbol: u64) -> Option<u8> {
        usize::try_from(symbol)
            .ok()
            .and_then(|idx| self.symbols.get(idx).copied())
    }

    #[must_use]
    pub fn contains(&self, base: u8) -> bool {
        self.lookup[base as usize] != INVALID
    }

    #[must_use]
    pub fn complement(&self, base: u8) -> u8 {
        self.complement[base as usize]
    }

    /// Writes the reverse complement of `seq` into `buf`
    pub fn reverse_complement_into(&self, seq: &[u8], buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend(seq.iter().rev().map(|&b| self.complement(b)));
    }

    #[must_use]
    pub fn reverse_complement(&self, seq: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(seq.len());
        self.reverse_complement_into(seq, &mut buf);
        buf
    }
}
impl Default for Alphabet {
    fn default() -> Self {
        Self::new(AlphabetId::default())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        let alphabet = Alphabet::new(AlphabetId::Acgtn);
        assert_eq!(alphabet.size(), 5);
        assert_eq!(alphabet.encode(b'A'), Some(0));
        assert_eq!(alphabet.encode(b'N'), Some(4));
        assert_eq!(alphabet.encode(b'R'), None);
        assert_eq!(alphabet.decode(3), Some(b'T'));
        assert_eq!(alphabet.decode(5), None);
    }

    #[test]
    fn test_iupac() -> crate::Result<()> {
        let alphabet = Alphabet::new(AlphabetId::from_u8(1)?);
        assert_eq!(alphabet.size(), 16);
        assert!(alphabet.contains(b'-'));
        assert_eq!(alphabet.reverse_complement(b"ARKB"), b"VMYT".to_vec());
        Ok(())
    }

    #[test]
    fn test_unknown_alphabet() {
        assert!(AlphabetId::from_u8(7).is_err());
    }

    #[test]
    fn test_reverse_complement() {
        let alphabet = Alphabet::default();
        assert_eq!(alphabet.reverse_complement(b"ACGTN"), b"NACGT".to_vec());
        assert!(alphabet.reverse_complement(b"").is_empty());
    }
}
