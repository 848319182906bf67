use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::sync::SyncMode;

/// Command line of the coordinator process.
#[derive(Debug, Parser)]
#[command(name = "syncp")]
#[command(about = "Synchronize cached writes to persistent storage, with progress", long_about = None)]
pub struct Cli {
    /// Sync only file data, no unneeded metadata
    #[arg(
        short = 'd',
        long = "data",
        requires = "files",
        conflicts_with = "file_system"
    )]
    pub data: bool,

    /// Sync the file systems that contain the files
    #[arg(short = 'f', long = "file-system")]
    pub file_system: bool,

    /// Give up waiting after this many seconds, 0 meaning wait forever;
    /// syncing itself continues in the background
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", default_value_t = 0)]
    pub timeout: u64,

    /// Seconds between progress updates
    #[arg(
        short = 'p',
        long = "period",
        value_name = "SECONDS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub period: u64,

    /// Files to sync; none means the whole system
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

/// Everything one run needs, resolved from the raw options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub mode: SyncMode,
    pub targets: Vec<PathBuf>,
    pub timeout: Option<Duration>,
    pub period: Duration,
}

impl Cli {
    /// Resolve the raw options. No operands always mean a whole-system
    /// sync, whatever the mode switches say.
    pub fn into_plan(self) -> SyncPlan {
        let mode = if self.files.is_empty() {
            SyncMode::WholeSystem
        } else if self.file_system {
            SyncMode::FileSystem
        } else if self.data {
            SyncMode::DataOnly
        } else {
            SyncMode::File
        };
        let timeout = match self.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        SyncPlan {
            mode,
            targets: self.files,
            timeout,
            period: Duration::from_secs(self.period),
        }
    }
}
