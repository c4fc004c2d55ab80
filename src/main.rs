//! DM Reader - inspect DigitalMicrograph DM3/DM4 files.
//!
//! This binary is a thin command-line front end over the library.

use std::error::Error;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dm_reader::{
    config::{BenchConfig, Cli, Command, DatasetConfig, InfoConfig, TagsConfig},
    AccessMode, DmFile, PixelArray,
};

type CommandResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.source().verbose);

    let result = match cli.command {
        Command::Info(config) => run_info(config),
        Command::Tags(config) => run_tags(config),
        Command::Dataset(config) => run_dataset(config),
        Command::Bench(config) => run_bench(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dm_reader=debug"
    } else {
        "dm_reader=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(value: &impl serde::Serialize, compact: bool) -> CommandResult {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> CommandResult {
    let options = config.source.read_options();
    options.validate()?;
    let file = DmFile::open(&config.source.path, &options)?;

    let output = json!({
        "path": config.source.path.display().to_string(),
        "header": file.header(),
        "tags": file.tags().root().entry_count(),
        "thumbnail": file.thumbnail(),
        "datasets": file.descriptors(),
    });
    print_json(&output, false)
}

// =============================================================================
// Tags Command
// =============================================================================

fn run_tags(config: TagsConfig) -> CommandResult {
    let options = config.source.read_options();
    options.validate()?;
    let file = DmFile::open(&config.source.path, &options)?;
    let tags = file.all_tags()?;

    match config.prefix {
        Some(prefix) => {
            let filtered: serde_json::Map<String, serde_json::Value> = tags
                .iter()
                .filter(|(path, _)| path.starts_with(&prefix))
                .map(|(path, value)| Ok((path.to_string(), serde_json::to_value(value)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            print_json(&filtered, config.compact)
        }
        None => print_json(&tags, config.compact),
    }
}

// =============================================================================
// Dataset Command
// =============================================================================

fn run_dataset(config: DatasetConfig) -> CommandResult {
    let options = config.source.read_options();
    options.validate()?;
    let file = DmFile::open(&config.source.path, &options)?;
    let dataset = file.dataset(config.index)?;

    let output = json!({
        "index": config.index,
        "name": dataset.name,
        "data_type": dataset.data_type,
        "shape": dataset.shape(),
        "pixel_size": dataset.pixel_size,
        "pixel_unit": dataset.pixel_unit,
        "pixel_origin": dataset.pixel_origin,
        "preview": preview(&dataset.data, config.preview),
    });
    print_json(&output, false)
}

/// First `n` samples in storage order.
fn preview(data: &PixelArray, n: usize) -> serde_json::Value {
    macro_rules! take {
        ($a:expr) => {{
            let samples: Vec<_> = $a.iter().take(n).collect();
            json!(samples)
        }};
    }
    match data {
        PixelArray::I8(a) => take!(a),
        PixelArray::U8(a) => take!(a),
        PixelArray::I16(a) => take!(a),
        PixelArray::U16(a) => take!(a),
        PixelArray::I32(a) => take!(a),
        PixelArray::U32(a) => take!(a),
        PixelArray::I64(a) => take!(a),
        PixelArray::U64(a) => take!(a),
        PixelArray::F32(a) => take!(a),
        PixelArray::F64(a) => take!(a),
        PixelArray::Complex64(a) => take!(a),
        PixelArray::Complex128(a) => take!(a),
        PixelArray::Rgba(a) => take!(a),
    }
}

// =============================================================================
// Bench Command
// =============================================================================

fn run_bench(config: BenchConfig) -> CommandResult {
    config.validate()?;
    let base = config.source.read_options();

    let mut timings = Vec::new();
    for mode in [AccessMode::File, AccessMode::Memory] {
        let options = base.clone().with_mode(mode);

        let start = Instant::now();
        let file = DmFile::open(&config.source.path, &options)?;
        let open_time = start.elapsed();

        let start = Instant::now();
        let mut bytes = 0;
        for _ in 0..config.repeat {
            bytes += file.raw_data(config.index)?.len();
        }
        let read_time = start.elapsed();
        file.close();

        info!(
            mode = %mode,
            open_ms = millis(open_time),
            read_ms = millis(read_time),
            bytes,
            "bench pass complete"
        );
        timings.push((mode, open_time, read_time));
    }

    let speedup = match (timings.first(), timings.get(1)) {
        (Some((_, _, file)), Some((_, _, memory))) if !memory.is_zero() => {
            Some(file.as_secs_f64() / memory.as_secs_f64())
        }
        _ => None,
    };

    let modes: Vec<serde_json::Value> = timings
        .iter()
        .map(|(mode, open, read)| {
            json!({
                "mode": mode.name(),
                "open_ms": millis(*open),
                "read_ms": millis(*read),
            })
        })
        .collect();

    let output = json!({
        "path": config.source.path.display().to_string(),
        "index": config.index,
        "repeat": config.repeat,
        "modes": modes,
        "speedup": speedup,
    });
    print_json(&output, false)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
