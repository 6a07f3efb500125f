//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobstate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobstate",
    version,
    about = "Run demo jobs through the job/task state machine with polling workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the service config (TOML).
    #[arg(
        long,
        value_name = "PATH",
        default_value_os_t = jobstate_core::config::default_config_path()
    )]
    pub config: PathBuf,

    /// Logging level. If omitted, `RUST_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// How many demo jobs to create per job type.
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub jobs_per_type: usize,

    /// Each demo handler fails this many times before succeeding.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub fail_first: u32,

    /// Give up waiting for jobs to settle after this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Order of the jobs in the summary, e.g. `jobId,asc`.
    #[arg(long, value_name = "FIELD[,DIR]", default_value = "createdTimestamp,desc")]
    pub sort: String,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
