// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use scanwerk_core::PipelineConfig;
use scanwerk_pipeline::RunMode;

/// Default configuration file, next to the default cache directory.
pub const DEFAULT_CONFIG: &str = ".cache/scanwerk.json";

/// Output root used by `--test-run`.
const TEST_RUN_PREFIX: &str = "./test";

#[derive(Debug, Parser)]
#[command(
    name = "scanwerk",
    version,
    about = "Split scanned sheets of photographs into individual, content-addressed photos"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; created with defaults when missing.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Write every output under ./test instead of the configured directories.
    #[arg(long, global = true)]
    pub test_run: bool,

    /// Ignore cached results (new results are still cached).
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Clockwise rotation applied to every scan before detection.
    #[arg(short = 'r', long, global = true)]
    pub initial_rotation: Option<u16>,

    /// Scan resolution in pixels per inch.
    #[arg(long, global = true)]
    pub resolution: Option<f64>,

    /// Maximum number of jobs running at once.
    #[arg(short = 'j', long = "jobs", global = true)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decompose scans and describe the photos they contain.
    Build {
        #[arg(long, value_enum, default_value_t = Mode::All)]
        mode: Mode,
        /// Image files, or directories of them.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print the content hash of each input.
    Hash {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Re-save scans under their content hash without decomposing them.
    Archive {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    All,
    Scans,
    Photos,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => RunMode::All,
            Mode::Scans => RunMode::Scans,
            Mode::Photos => RunMode::Photos,
        }
    }
}

impl Cli {
    /// Layer command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if self.test_run {
            config.dest = config.dest.prefixed(Path::new(TEST_RUN_PREFIX));
        }
        if self.no_cache {
            config.use_cache = false;
        }
        if let Some(rotation) = self.initial_rotation {
            config.initial_rotation = rotation;
        }
        if let Some(resolution) = self.resolution {
            config.detection.resolution = resolution;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}
