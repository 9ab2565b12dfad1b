mod diff;
mod frame;
mod image;
mod packets;

use std::fs::File;
use std::io::stderr;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use lrpt::framing::Vcid;
use lrpt::spacepacket::Apid;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode raw CADU data into synchronized, derandomized, Reed-Solomon
    /// corrected VCDU frames.
    ///
    /// The input need not be byte-aligned; it is synchronized on the
    /// standard CCSDS attached sync marker first. The output frame data
    /// never includes Reed-Solomon check symbols.
    Frame {
        /// Include these VCIDs or VCID ranges.
        ///
        /// Accepts a CSV of VCIDs as well as ranges of the format
        /// `<start>-<end>`, inclusive on both ends, e.g. `0,1,2,10-20`.
        ///
        /// If used with --exclude, values are first included, then excluded.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        include: Vec<String>,

        /// Exclude these VCIDs or VCID ranges, same format as --include.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        exclude: Vec<String>,

        /// Output file path. Defaults to the input name with a `.frames`
        /// suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Perform Reed-Solomon error detection and correction, dropping
        /// uncorrectable frames.
        ///
        /// By default, check symbols are stripped but no detection or
        /// correction is attempted.
        #[arg(short, long)]
        correct: bool,

        /// Summary report format.
        #[arg(short, long, default_value = "text")]
        format: frame::Format,

        /// Input CADU file.
        input: PathBuf,
    },

    /// Decode CCSDS space packets from a frame file produced by `frame`.
    Packets {
        /// Include these APIDs or APID ranges, same format as `frame
        /// --include`.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        include: Vec<String>,

        /// Exclude these APIDs or APID ranges, same format as `frame
        /// --include`.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        exclude: Vec<String>,

        /// Output file path. Defaults to the input name with a `.packets`
        /// suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input frame file.
        input: PathBuf,
    },

    /// Decode MSU-MR imagery from a space packet file into per-channel PNGs
    /// and an optional RGB composite.
    Image {
        /// Restrict decoding to these imagery APIDs (60-69). Defaults to
        /// all imagery APIDs present in the input.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        include: Vec<String>,

        /// Also write a `composite.png` RGB composite using APIDs 65
        /// (red), 66 (green), and 64 (blue).
        #[arg(short, long)]
        composite: bool,

        /// Output directory for decoded PNGs. Created if it does not exist.
        #[arg(short, long, default_value = "images")]
        out_dir: PathBuf,

        /// Input space packet file.
        input: PathBuf,
    },

    /// Difference 2 packet files.
    ///
    /// Packet differences are based on APID, sequence number, and CRC (not
    /// including the packet header).
    Diff {
        left: PathBuf,
        right: PathBuf,
        /// Show details on specific missing packets.
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Failures are tagged so `main` can select the exit code the distilled
/// spec calls for: 0 success, 1 bad input, 2 decoding failure.
enum Failure {
    BadInput(anyhow::Error),
    Decode(anyhow::Error),
}

fn parse_number_ranges(list: Vec<String>) -> Result<Vec<u32>, Failure> {
    let rx = regex::Regex::new(r"^(?:(\d+)|(\d+)-(\d+))$").expect("regex to compile");
    let mut values = Vec::default();
    for (i, s) in list.into_iter().enumerate() {
        let Some(cap) = rx.captures(&s) else {
            return Err(Failure::BadInput(anyhow!("invalid range at {i}")));
        };

        if cap.get(1).is_some() {
            let x = cap[1]
                .parse::<u32>()
                .map_err(|_| Failure::BadInput(anyhow!("invalid number value at {i}")))?;
            values.push(x);
        } else {
            let start = cap[2]
                .parse::<u32>()
                .map_err(|_| Failure::BadInput(anyhow!("invalid range value at {i}")))?;
            let end = cap[3]
                .parse::<u32>()
                .map_err(|_| Failure::BadInput(anyhow!("invalid range value at {i}")))?;
            if start >= end {
                return Err(Failure::BadInput(anyhow!("invalid range at {i}")));
            }
            values.extend(start..=end);
        }
    }

    Ok(values)
}

fn parse_vcids(list: Vec<String>) -> Result<Vec<Vcid>, Failure> {
    Ok(parse_number_ranges(list)?
        .iter()
        .filter_map(|v| Vcid::try_from(*v).ok())
        .collect())
}

fn parse_apids(list: Vec<String>) -> Result<Vec<Apid>, Failure> {
    Ok(parse_number_ranges(list)?
        .iter()
        .filter_map(|v| Apid::try_from(*v).ok())
        .collect())
}

fn output_path(output: &Option<PathBuf>, input: &std::path::Path, suffix: &str) -> PathBuf {
    output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}.{suffix}",
            input.file_name().unwrap().to_string_lossy()
        ))
    })
}

fn run(cli: Cli) -> Result<(), Failure> {
    match cli.command {
        Commands::Frame {
            include,
            exclude,
            output,
            correct,
            format,
            input,
        } => {
            let include = parse_vcids(include)?;
            let exclude = parse_vcids(exclude)?;
            let output = output_path(&output, &input, "frames");
            debug!(?output, correct, "writing frames");

            frame::frame(&input, &output, &include, &exclude, correct, &format)
                .map_err(Failure::Decode)
        }
        Commands::Packets {
            include,
            exclude,
            output,
            input,
        } => {
            let include = parse_apids(include)?;
            let exclude = parse_apids(exclude)?;
            let output = output_path(&output, &input, "packets");
            let dest = File::create(&output)
                .with_context(|| format!("failed to create output {output:?}"))
                .map_err(Failure::BadInput)?;
            debug!(?output, "writing packets");

            packets::packets(&input, dest, &include, &exclude).map_err(Failure::Decode)
        }
        Commands::Image {
            include,
            composite,
            out_dir,
            input,
        } => {
            let include = parse_apids(include)?;
            debug!(?out_dir, composite, "decoding imagery");

            image::image(&input, &out_dir, &include, composite).map_err(Failure::Decode)
        }
        Commands::Diff {
            left,
            right,
            verbose,
        } => diff::diff(&left, &right, verbose).map_err(|err| {
            if err.to_string() == "differences present" {
                Failure::Decode(err)
            } else {
                Failure::BadInput(err)
            }
        }),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(EnvFilter::try_from_env("LRPT_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    debug!(
        "{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(Failure::BadInput(err)) => {
            eprintln!("{err:?}");
            std::process::exit(1);
        }
        Err(Failure::Decode(err)) => {
            eprintln!("{err:?}");
            std::process::exit(2);
        }
    }
}
