use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::error;

use super::{flush, SyncMode};

/// First argument that marks an invocation as an internal worker process.
/// Workers are the same binary re-executed, never spawned by users.
pub const SENTINEL: &str = "__sync-worker";

/// Environment marker the launcher sets on every worker it starts. Dispatch
/// requires it alongside [`SENTINEL`]; the sentinel by itself is a valid
/// file name a user could ask to sync.
pub const WORKER_ENV: &str = "SYNCP_INTERNAL_WORKER";

/// Argument vector of one worker process, built by the launcher.
#[derive(Debug, Parser)]
pub struct WorkerArgs {
    /// Which flush call to issue.
    #[arg(long, value_enum)]
    pub mode: SyncMode,
    /// Path to flush; absent exactly for whole-system mode.
    pub target: Option<PathBuf>,
}

/// Worker process body: flush the assignment and exit. Exit code 0 means
/// every step succeeded, 1 means at least one failed.
pub fn run(args: WorkerArgs) -> ! {
    let ok = match (args.mode.takes_target(), args.target) {
        (false, None) => {
            flush::flush_system();
            true
        }
        (true, Some(target)) => flush::flush_path(args.mode, &target),
        (true, None) => {
            error!("sync worker started without a target");
            false
        }
        (false, Some(target)) => {
            error!("whole-system sync worker given target {}", target.display());
            false
        }
    };
    process::exit(if ok { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_targeted_worker_argv() {
        let args = WorkerArgs::parse_from([SENTINEL, "--mode", "data-only", "/var/log/syslog"]);
        assert_eq!(args.mode, SyncMode::DataOnly);
        assert_eq!(args.target.as_deref(), Some(Path::new("/var/log/syslog")));
    }

    #[test]
    fn parses_whole_system_worker_argv() {
        let args = WorkerArgs::parse_from([SENTINEL, "--mode", "whole-system"]);
        assert_eq!(args.mode, SyncMode::WholeSystem);
        assert!(args.target.is_none());
    }

    #[test]
    fn rejects_unknown_mode() {
        let parsed = WorkerArgs::try_parse_from([SENTINEL, "--mode", "everything"]);
        assert!(parsed.is_err());
    }
}
