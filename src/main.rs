use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use mpegg_streams::simulate::{DEFAULT_SEED, SimulationConfig, simulate};
use mpegg_streams::{
    AccessUnit, DEFAULT_COMPRESSION_LEVEL, DEFAULT_READS_PER_BLOCK, DecodedRead,
    ParameterSetBuilder, QvParameters, ReadStreamDecoder, ReadStreamEncoder, SequencedRead,
    restore_read_order,
};

#[derive(Parser)]
#[command(name = "mpegg-streams")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Descriptor stream encoder/decoder for genomic access units", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate reads, encode them, write and read the access units back, decode and verify
    Roundtrip(RoundtripArgs),
    /// Summarize the access units of a file
    Inspect(InspectArgs),
}

#[derive(Parser)]
struct RoundtripArgs {
    /// Number of reads (both mates counted)
    #[arg(short = 'n', long, default_value = "10000")]
    reads: usize,

    /// Bases per read
    #[arg(short = 'l', long, default_value = "100")]
    read_length: u64,

    /// Simulate paired reads
    #[arg(short, long)]
    paired: bool,

    /// Genomic records per access unit
    #[arg(short, long, default_value_t = DEFAULT_READS_PER_BLOCK)]
    block_size: usize,

    /// Number of threads (0 = all cores)
    #[arg(short = 't', long, default_value = "0")]
    threads: usize,

    /// Per-base noise probability
    #[arg(long, default_value = "0.01")]
    noise: f64,

    /// Fraction of unaligned reads
    #[arg(long, default_value = "0.05")]
    unaligned: f64,

    /// Do not simulate quality values
    #[arg(long)]
    no_quality: bool,

    /// zstd level of the payloads
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    level: i32,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Keep the serialized access units in this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct InspectArgs {
    /// Serialized access units
    #[arg(short, long, value_name = "FILE", required = true)]
    input: PathBuf,
}

fn roundtrip(args: &RoundtripArgs) -> Result<()> {
    let simulation = simulate(
        &SimulationConfig::default()
            .num_reads(args.reads)
            .read_length(args.read_length)
            .paired(args.paired)
            .noise_rate(args.noise)
            .unaligned_rate(args.unaligned)
            .qualities(!args.no_quality)
            .seed(args.seed),
    );
    let reads = &simulation.reads;

    let qv = if args.no_quality {
        QvParameters::disabled()
    } else {
        QvParameters::default()
    };
    let params = ParameterSetBuilder::default()
        .num_reads_per_block(args.block_size)
        .template_segments(if args.paired { 2 } else { 1 })
        .qv(qv)
        .build()?;

    let start = Instant::now();
    let dataset = ReadStreamEncoder::new(params.clone())
        .with_threads(args.threads)
        .encode(reads)?;
    info!(
        blocks = dataset.num_blocks(),
        elapsed = ?start.elapsed(),
        "encoded"
    );

    let mut bytes = Vec::new();
    for unit in &dataset.access_units {
        unit.write_to(&mut bytes, &params, args.level)?;
    }
    if let Some(path) = &args.output {
        let mut writer = BufWriter::new(fs::File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    info!(bytes = bytes.len(), "serialized access units");

    let mut reader = bytes.as_slice();
    let mut units = Vec::with_capacity(dataset.num_blocks());
    while let Some(unit) = AccessUnit::read_from(&mut reader)? {
        units.push(unit);
    }

    let start = Instant::now();
    let blocks = ReadStreamDecoder::new(&params)
        .with_reference(&simulation.reference)
        .decode_all(&units, args.threads)?;
    let decoded = restore_read_order(&blocks, &dataset.quality_index)?;
    info!(elapsed = ?start.elapsed(), "decoded");

    let mismatches = reads
        .iter()
        .zip(&decoded)
        .filter(|(read, decoded)| !matches(read, decoded))
        .count();
    if decoded.len() != reads.len() || mismatches > 0 {
        bail!(
            "round trip failed: {} of {} reads differ ({} decoded)",
            mismatches,
            reads.len(),
            decoded.len()
        );
    }

    let stats = dataset.stats;
    println!(
        "reads\t{}\nblocks\t{}\nbytes\t{}\nbits_per_base\t{:.3}\nsame_record\t{}\nsplit_same_block\t{}\nsplit_other_block\t{}",
        reads.len(),
        dataset.num_blocks(),
        bytes.len(),
        bytes.len() as f64 * 8.0 / (reads.len() as f64 * args.read_length as f64).max(1.0),
        stats.same_record,
        stats.split_same_block,
        stats.split_other_block,
    );
    Ok(())
}

fn matches(read: &SequencedRead, decoded: &DecodedRead) -> bool {
    read.length == decoded.length
        && read.sequence == decoded.sequence
        && read.qualities == decoded.qualities
        && read.position() == decoded.position
        && read.alignment.as_ref().is_some_and(|a| a.reverse) == decoded.reverse
        && read.flags == decoded.flags
}

fn inspect(args: &InspectArgs) -> Result<()> {
    let mut reader = BufReader::new(fs::File::open(&args.input)?);
    let mut writer = BufWriter::new(io::stdout());
    writeln!(writer, "block\tclass\trecords\tstart\tend\truns\tvalues")?;
    while let Some(unit) = AccessUnit::read_from(&mut reader)? {
        let header = &unit.header;
        writeln!(
            writer,
            "{}\t{:?}\t{}\t{}\t{}\t{}\t{}",
            header.block_index,
            unit.class()?,
            header.num_records,
            header.start_position,
            header.end_position,
            header.reference_runs,
            unit.streams.total_values(),
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Roundtrip(args) => roundtrip(&args),
        Commands::Inspect(args) => inspect(&args),
    }
}
