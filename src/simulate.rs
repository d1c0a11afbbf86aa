//! Random reads against a random reference
//!
//! Used by the command line round trip and by the integration tests. Every
//! aligned read is derived from the same reference, so the reads of a block
//! always agree on the reference bases they cover.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::core::{Clip, Clips, Noise};
use crate::encode::{ReadAlignment, SequencedRead, mate_of};
use crate::params::Codebook;

/// Seed used when none is given
pub const DEFAULT_SEED: u64 = 42;

const BASES: &[u8; 4] = b"ACGT";

/// Knobs of the read simulator
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Total number of reads (both mates counted for paired reads)
    pub num_reads: usize,
    pub read_length: u64,
    pub reference_length: u64,
    pub paired: bool,
    /// Fraction of reads left unaligned
    pub unaligned_rate: f64,
    /// Per-base probability of a substitution, insertion or deletion
    pub noise_rate: f64,
    /// Per-read probability of soft clips
    pub clip_rate: f64,
    pub qualities: bool,
    pub flags: bool,
    pub seed: u64,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_reads: 1000,
            read_length: 100,
            reference_length: 100_000,
            paired: false,
            unaligned_rate: 0.05,
            noise_rate: 0.01,
            clip_rate: 0.05,
            qualities: true,
            flags: true,
            seed: DEFAULT_SEED,
        }
    }
}
impl SimulationConfig {
    #[must_use]
    pub fn num_reads(mut self, n: usize) -> Self {
        self.num_reads = n;
        self
    }

    #[must_use]
    pub fn read_length(mut self, len: u64) -> Self {
        self.read_length = len;
        self
    }

    #[must_use]
    pub fn reference_length(mut self, len: u64) -> Self {
        self.reference_length = len;
        self
    }

    #[must_use]
    pub fn paired(mut self, paired: bool) -> Self {
        self.paired = paired;
        self
    }

    #[must_use]
    pub fn unaligned_rate(mut self, rate: f64) -> Self {
        self.unaligned_rate = rate;
        self
    }

    #[must_use]
    pub fn noise_rate(mut self, rate: f64) -> Self {
        self.noise_rate = rate;
        self
    }

    #[must_use]
    pub fn clip_rate(mut self, rate: f64) -> Self {
        self.clip_rate = rate;
        self
    }

    #[must_use]
    pub fn qualities(mut self, qualities: bool) -> Self {
        self.qualities = qualities;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: bool) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Simulated reads and the reference they were drawn from
#[derive(Debug, Clone)]
pub struct Simulation {
    pub reference: Vec<u8>,
    pub reads: Vec<SequencedRead>,
}

/// Generates reads in original order
///
/// Paired reads follow the mate layout of the encoder: read `i` and
/// [`mate_of`]`(i, n)` form a pair, the mate on the opposite strand a few
/// hundred bases downstream. Both mates carry the same flags.
#[must_use]
pub fn simulate(config: &SimulationConfig) -> Simulation {
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let read_length = config.read_length.max(1);
    // room for deletions and the mate insert
    let reference_length = config.reference_length.max(4 * read_length + 1000);
    let reference: Vec<u8> = (0..reference_length)
        .map(|_| BASES[rng.random_range(0..4)])
        .collect();

    let num_reads = if config.paired {
        config.num_reads & !1
    } else {
        config.num_reads
    };
    let last_start = reference_length - 3 * read_length - 600;

    let mut reads = vec![SequencedRead::default(); num_reads];
    let mut simulator = ReadSimulator {
        config,
        reference: &reference,
        rng: &mut rng,
    };
    for index in 0..num_reads {
        if config.paired && index >= num_reads / 2 {
            continue;
        }
        let position = simulator.rng.random_range(0..last_start);
        let reverse = simulator.rng.random_bool(0.5);
        reads[index] = simulator.read(position, reverse);
        if config.paired {
            let insert = simulator.rng.random_range(read_length..read_length + 500);
            let mate = simulator.read(position + insert, !reverse);
            // flags describe the template
            let flags = reads[index].flags;
            reads[mate_of(index, num_reads)] = mate.with_flags(flags);
        }
    }

    Simulation { reference, reads }
}

struct ReadSimulator<'a> {
    config: &'a SimulationConfig,
    reference: &'a [u8],
    rng: &'a mut SmallRng,
}
impl ReadSimulator<'_> {
    fn read(&mut self, position: u64, reverse: bool) -> SequencedRead {
        let length = self.config.read_length.max(1);
        let mut read = if self.rng.random_bool(self.config.unaligned_rate) {
            let sequence: Vec<u8> = (0..length).map(|_| self.random_base(true)).collect();
            SequencedRead::from_sequence(&sequence)
        } else {
            self.aligned(position, reverse, length)
        };

        if self.config.qualities {
            let phred = Codebook::phred();
            let qualities: Vec<u8> = (0..length)
                .map(|_| phred.reconstruct(self.rng.random_range(2..42)).unwrap_or(b'I'))
                .collect();
            read = read.with_qualities(&qualities);
        }
        if self.config.flags {
            read = read.with_flags(self.rng.random_range(0..8));
        }
        read
    }

    fn aligned(&mut self, position: u64, reverse: bool, length: u64) -> SequencedRead {
        let clipped = length > 12 && self.rng.random_bool(self.config.clip_rate);
        let (left, right) = if clipped {
            (self.rng.random_range(0..5), self.rng.random_range(1..5))
        } else {
            (0, 0)
        };
        let aligned = length - left - right;

        let mut forward: Vec<u8> = (0..left).map(|_| self.random_base(false)).collect();
        let mut noise = Vec::new();
        let mut column = 0;
        let mut ref_pos = position as usize;
        let mut emitted = 0;
        while emitted < aligned {
            let reference_base = self.reference[ref_pos];
            if !self.rng.random_bool(self.config.noise_rate) {
                forward.push(reference_base);
                ref_pos += 1;
                emitted += 1;
                column += 1;
                continue;
            }
            match self.rng.random_range(0..3) {
                // a deletion never opens the alignment
                0 if emitted > 0
                    && ref_pos + 1 + (aligned - emitted) as usize <= self.reference.len() =>
                {
                    noise.push(Noise::deletion(column));
                    ref_pos += 1;
                }
                1 => {
                    let base = self.random_base(false);
                    noise.push(Noise::insertion(column, base));
                    forward.push(base);
                    emitted += 1;
                }
                _ => {
                    let base = loop {
                        let base = self.random_base(true);
                        if base != reference_base {
                            break base;
                        }
                    };
                    noise.push(Noise::substitution(column, base, reference_base));
                    forward.push(base);
                    ref_pos += 1;
                    emitted += 1;
                }
            }
            column += 1;
        }
        forward.extend((0..right).map(|_| self.random_base(false)));

        let clips = Clips::new(
            if left > 0 { Clip::Soft(left) } else { Clip::None },
            if right > 0 { Clip::Soft(right) } else { Clip::None },
        );
        let sequence = if reverse {
            crate::alphabet::Alphabet::default().reverse_complement(&forward)
        } else {
            forward
        };
        SequencedRead::from_sequence(&sequence).with_alignment(
            ReadAlignment::new(position)
                .reversed(reverse)
                .with_noise(noise)
                .with_clips(clips),
        )
    }

    fn random_base(&mut self, with_n: bool) -> u8 {
        if with_n && self.rng.random_bool(0.02) {
            b'N'
        } else {
            BASES[self.rng.random_range(0..4)]
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::core::NoiseKind;

    #[test]
    fn test_reproducible() {
        let config = SimulationConfig::default().num_reads(50).seed(7);
        let first = simulate(&config);
        let second = simulate(&config);
        assert_eq!(first.reads, second.reads);
        assert_eq!(first.reference, second.reference);
    }

    #[test]
    fn test_reads_follow_reference() {
        let config = SimulationConfig::default()
            .num_reads(200)
            .noise_rate(0.0)
            .clip_rate(0.0)
            .unaligned_rate(0.0);
        let simulation = simulate(&config);
        let alphabet = crate::alphabet::Alphabet::default();
        for read in &simulation.reads {
            let alignment = read.alignment.as_ref().expect("aligned read");
            let sequence = read.sequence.as_deref().expect("bases");
            let forward = if alignment.reverse {
                alphabet.reverse_complement(sequence)
            } else {
                sequence.to_vec()
            };
            let start = alignment.position as usize;
            assert_eq!(forward, &simulation.reference[start..start + forward.len()]);
        }
    }

    #[test]
    fn test_noise_columns_are_increasing() {
        let config = SimulationConfig::default().num_reads(300).noise_rate(0.2);
        let simulation = simulate(&config);
        for read in &simulation.reads {
            let Some(alignment) = &read.alignment else {
                continue;
            };
            assert!(alignment.noise.windows(2).all(|w| w[0].column < w[1].column));
            assert_ne!(
                alignment.noise.first().map(|n| n.kind),
                Some(NoiseKind::Deletion)
            );
            assert_eq!(read.sequence.as_ref().map(Vec::len), Some(100));
        }
    }

    #[test]
    fn test_paired_mates() {
        let config = SimulationConfig::default()
            .num_reads(101)
            .paired(true)
            .unaligned_rate(0.0);
        let simulation = simulate(&config);
        assert_eq!(simulation.reads.len(), 100);
        for index in 0..50 {
            let read = &simulation.reads[index];
            let mate = &simulation.reads[mate_of(index, 100)];
            let (Some(a), Some(b)) = (&read.alignment, &mate.alignment) else {
                panic!("mates are aligned");
            };
            assert!(b.position > a.position);
            assert_ne!(a.reverse, b.reverse);
        }
    }
}
