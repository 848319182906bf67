pub mod flush;
pub mod manager;
pub mod worker;

pub use manager::{ProcessLauncher, SyncManager, SyncState};

use clap::ValueEnum;

/// How a single worker flushes its assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    /// Flush every dirty buffer on the machine (sync(2)), no target.
    WholeSystem,
    /// Flush one file's data and metadata (fsync(2)).
    File,
    /// Flush one file's data only (fdatasync(2)).
    DataOnly,
    /// Flush the file system containing one file (syncfs(2)).
    FileSystem,
}

impl SyncMode {
    /// Whether this mode operates on a named path or on the machine.
    pub fn takes_target(self) -> bool {
        !matches!(self, SyncMode::WholeSystem)
    }

    /// Spelling used on worker argument vectors. Must parse back through
    /// [`ValueEnum`].
    pub fn flag(self) -> &'static str {
        match self {
            SyncMode::WholeSystem => "whole-system",
            SyncMode::File => "file",
            SyncMode::DataOnly => "data-only",
            SyncMode::FileSystem => "file-system",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_system_is_targetless() {
        assert!(!SyncMode::WholeSystem.takes_target());
        assert!(SyncMode::File.takes_target());
        assert!(SyncMode::DataOnly.takes_target());
        assert!(SyncMode::FileSystem.takes_target());
    }

    #[test]
    fn flag_spelling_survives_argv_round_trip() {
        for mode in [
            SyncMode::WholeSystem,
            SyncMode::File,
            SyncMode::DataOnly,
            SyncMode::FileSystem,
        ] {
            let parsed = SyncMode::from_str(mode.flag(), false).unwrap();
            assert_eq!(parsed, mode);
        }
    }
}
