use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::Context;
use clap::Parser;
use imaging::{
    memory::{BuddyArena, HeapAllocator, PixelAllocator},
    raster::{PixelStore, codec},
};

use crate::{
    cli::Cli,
    config::BenchConfig,
    report::{RunReport, peak_rss_kb, print_results},
};

mod cli;
mod config;
mod report;

enum Strategy {
    Heap,
    Buddy { capacity: usize },
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(parse_error_exit_code(&err));
        }
    };

    let config = BenchConfig::load_if_exists()?;
    if let Some(threads) = config.worker_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    println!("=== IMAGE PROCESSING BENCHMARK ===");
    println!("Input file: {}", args.input.display());
    println!("Output file: {}", args.output.display());
    println!(
        "Allocation mode: {}",
        if args.buddy {
            "heap + buddy arena"
        } else {
            "heap only"
        }
    );
    println!("-------------------------------");

    let mut reports = Vec::new();
    reports.push(run(&args, Strategy::Heap, &prefixed(&args.output, "new_"))?);

    if args.buddy {
        reports.push(run(
            &args,
            Strategy::Buddy {
                capacity: config.arena_capacity,
            },
            &prefixed(&args.output, "buddy_"),
        )?);
    }

    print_results(&reports);
    Ok(())
}

/// One measured run: decode, transform, encode, all inside the timed region
/// so the two strategies pay for the same work.
fn run(args: &Cli, strategy: Strategy, output: &Path) -> anyhow::Result<RunReport> {
    let rss_before = peak_rss_kb();
    let start = Instant::now();

    let allocator: Box<dyn PixelAllocator> = match strategy {
        Strategy::Heap => Box::new(HeapAllocator),
        Strategy::Buddy { capacity } => Box::new(BuddyArena::new(capacity)),
    };

    let decoded = codec::decode(&args.input)?;
    let mut store = PixelStore::from_flat(
        &decoded.pixels,
        decoded.width,
        decoded.height,
        decoded.channels,
        allocator,
    )
    .context("pixel storage allocation failed")?;
    drop(decoded);

    if args.invert {
        store.invert();
    }
    if let Some(angle) = args.angle {
        store
            .rotate(angle)
            .context("rotation buffer allocation failed")?;
    }
    if let Some(factor) = args.scale {
        store
            .scale(factor)
            .context("scaling buffer allocation failed")?;
    }

    let elapsed_ms = start.elapsed().as_millis();
    let peak_rss_delta_kb = peak_rss_kb().saturating_sub(rss_before);

    println!("Dimensions: {} x {}", store.width(), store.height());
    println!("Channels: {}", store.channels());
    if let Some(angle) = args.angle {
        println!("Rotation angle: {} degrees", angle);
    }
    if let Some(factor) = args.scale {
        println!("Scale factor: {}", factor);
    }
    println!("-------------------------------");

    codec::encode(
        output,
        store.as_bytes(),
        store.width(),
        store.height(),
        store.channels(),
    )?;

    Ok(RunReport {
        label: store.allocator_name(),
        elapsed_ms,
        peak_rss_delta_kb,
    })
}

/// `new_` / `buddy_` prefix on the file name, keeping any directory part.
fn prefixed(path: &Path, prefix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", prefix, name))
}

/// Help and version requests are successful outcomes; anything else is a
/// bad invocation, which exits 1 per the benchmark contract.
fn parse_error_exit_code(err: &clap::Error) -> i32 {
    use clap::error::ErrorKind;

    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_and_version_exit_zero() {
        for flags in [["bench", "--help"], ["bench", "--version"]] {
            let err = Cli::try_parse_from(flags).err().expect("parsing should fail");
            assert_eq!(parse_error_exit_code(&err), 0);
        }
    }

    #[test]
    fn test_missing_arguments_exit_one() {
        let err = Cli::try_parse_from(["bench"]).err().expect("parsing should fail");
        assert_eq!(parse_error_exit_code(&err), 1);

        let err = Cli::try_parse_from(["bench", "only_input.png"])
            .err()
            .expect("parsing should fail");
        assert_eq!(parse_error_exit_code(&err), 1);
    }
}
