//! Configuration management for DM Reader.
//!
//! This module provides:
//! - [`ReadOptions`], the library-side knobs applied when a file is opened
//! - The command-line types for the `dm-reader` binary, parsed with clap
//!
//! # Environment Variables
//!
//! Options shared by every subcommand can also be set through the
//! environment with the `DM_` prefix:
//!
//! - `DM_ACCESS_MODE` - `file` or `memory` (default: file)
//! - `DM_KEEP_THUMBNAIL` - Expose the preview image as dataset 0 (default: false)
//! - `DM_INLINE_ARRAY_LIMIT` - Largest array kept during the tree walk, in bytes (default: 4096)
//! - `DM_READ_AHEAD` - Read-ahead window for the tree walk, in bytes (default: 65536)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io::{AccessMode, DEFAULT_READ_AHEAD};

// =============================================================================
// Default Values
// =============================================================================

/// Default largest array (in bytes) whose values are kept during parsing.
pub const DEFAULT_INLINE_ARRAY_LIMIT: usize = 4096;

/// Smallest accepted read-ahead window.
pub const MIN_READ_AHEAD: usize = 64;

/// Largest accepted read-ahead window (64MB).
pub const MAX_READ_AHEAD: usize = 64 * 1024 * 1024;

/// Largest accepted inline array limit (16MB).
pub const MAX_INLINE_ARRAY_LIMIT: usize = 16 * 1024 * 1024;

/// Default number of repeated reads for `bench`.
pub const DEFAULT_BENCH_REPEAT: usize = 10;

/// Default number of samples printed by `dataset`.
pub const DEFAULT_PREVIEW: usize = 16;

// =============================================================================
// ReadOptions
// =============================================================================

/// Options applied when opening a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// How payload bytes are served
    pub mode: AccessMode,

    /// Hide the leading preview image when several images exist
    pub skip_thumbnail: bool,

    /// Arrays up to this many bytes are kept while the tree is parsed.
    /// Larger ones are read from the source when needed.
    pub inline_array_limit: usize,

    /// Window size of the tree walk
    pub read_ahead: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            mode: AccessMode::default(),
            skip_thumbnail: true,
            inline_array_limit: DEFAULT_INLINE_ARRAY_LIMIT,
            read_ahead: DEFAULT_READ_AHEAD,
        }
    }
}

impl ReadOptions {
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_skip_thumbnail(mut self, skip: bool) -> Self {
        self.skip_thumbnail = skip;
        self
    }

    pub fn with_inline_array_limit(mut self, limit: usize) -> Self {
        self.inline_array_limit = limit;
        self
    }

    pub fn with_read_ahead(mut self, window: usize) -> Self {
        self.read_ahead = window;
        self
    }

    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.read_ahead < MIN_READ_AHEAD || self.read_ahead > MAX_READ_AHEAD {
            return Err(format!(
                "read_ahead must be between {} bytes and {}MB",
                MIN_READ_AHEAD,
                MAX_READ_AHEAD / (1024 * 1024)
            ));
        }

        if self.inline_array_limit > MAX_INLINE_ARRAY_LIMIT {
            return Err(format!(
                "inline_array_limit must be at most {}MB",
                MAX_INLINE_ARRAY_LIMIT / (1024 * 1024)
            ));
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// DM Reader - inspect DigitalMicrograph DM3/DM4 files.
///
/// Prints headers, tag trees and image datasets, and compares file-backed
/// against memory-backed access.
#[derive(Parser, Debug, Clone)]
#[command(name = "dm-reader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the header and a summary of every dataset
    Info(InfoConfig),

    /// Print every tag as JSON
    Tags(TagsConfig),

    /// Print one dataset's calibration and leading samples
    Dataset(DatasetConfig),

    /// Time repeated dataset reads in both access modes
    Bench(BenchConfig),
}

impl Command {
    pub fn source(&self) -> &SourceArgs {
        match self {
            Command::Info(c) => &c.source,
            Command::Tags(c) => &c.source,
            Command::Dataset(c) => &c.source,
            Command::Bench(c) => &c.source,
        }
    }
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Path to a .dm3 or .dm4 file.
    pub path: PathBuf,

    /// Access mode for payload reads.
    #[arg(long, value_enum, default_value_t = AccessMode::File, env = "DM_ACCESS_MODE")]
    pub mode: AccessMode,

    /// Expose the leading preview image as a regular dataset.
    #[arg(long, default_value_t = false, env = "DM_KEEP_THUMBNAIL")]
    pub keep_thumbnail: bool,

    /// Largest array (bytes) kept during the tree walk.
    #[arg(long, default_value_t = DEFAULT_INLINE_ARRAY_LIMIT, env = "DM_INLINE_ARRAY_LIMIT")]
    pub inline_array_limit: usize,

    /// Read-ahead window (bytes) for the tree walk.
    #[arg(long, default_value_t = DEFAULT_READ_AHEAD, env = "DM_READ_AHEAD")]
    pub read_ahead: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SourceArgs {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            mode: self.mode,
            skip_thumbnail: !self.keep_thumbnail,
            inline_array_limit: self.inline_array_limit,
            read_ahead: self.read_ahead,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TagsConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only print tags whose path starts with this prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DatasetConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Dataset index (0-based).
    #[arg(short, long, default_value_t = 0)]
    pub index: usize,

    /// Number of leading samples to print.
    #[arg(long, default_value_t = DEFAULT_PREVIEW)]
    pub preview: usize,
}

#[derive(Args, Debug, Clone)]
pub struct BenchConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Dataset index (0-based).
    #[arg(short, long, default_value_t = 0)]
    pub index: usize,

    /// Number of reads per access mode.
    #[arg(short, long, default_value_t = DEFAULT_BENCH_REPEAT)]
    pub repeat: usize,
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.repeat == 0 {
            return Err("repeat must be greater than 0".to_string());
        }
        self.source.read_options().validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
