use std::ffi::OsStr;
use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use humantime::format_duration;
use tracing::{debug, error, info};

mod cli;
mod monitor;
mod sync;
mod utils;

use crate::cli::{Cli, SyncPlan};
use crate::monitor::{Deadline, ProgressMonitor, WaitOutcome};
use crate::sync::{worker, ProcessLauncher, SyncManager};

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init_tracing();

    // Worker processes are this binary re-executed; route them before the
    // user-facing parser ever sees the argument vector. The environment
    // marker is required too: the sentinel by itself is a file name a user
    // may legitimately pass.
    if std::env::var_os(worker::WORKER_ENV).is_some()
        && std::env::args_os().nth(1).as_deref() == Some(OsStr::new(worker::SENTINEL))
    {
        worker::run(worker::WorkerArgs::parse_from(std::env::args_os().skip(1)));
    }

    let plan = Cli::parse().into_plan();
    let code = run(plan).await?;
    std::process::exit(code)
}

/// Coordinator body: start the workers, watch them, report.
async fn run(plan: SyncPlan) -> Result<i32> {
    let launcher = Arc::new(ProcessLauncher::from_current_exe()?);
    let manager = SyncManager::new(launcher);
    let state = manager.state();

    let worker_total = plan.targets.len().max(1);
    info!("spawning {worker_total} sync worker(s)");
    if let Some(limit) = plan.timeout {
        info!("giving up after {}", format_duration(limit));
    }
    debug!(
        "mode {:?}, period {}",
        plan.mode,
        format_duration(plan.period)
    );

    manager.spawn_all(plan.mode, &plan.targets);

    let deadline = plan.timeout.map(Deadline::starting_now);
    let monitor = ProgressMonitor::new(plan.period);
    let outcome = monitor
        .run(&state, deadline.as_ref(), &mut io::stdout())
        .await;

    let (code, report) = closing_report(outcome, state.has_failed());
    if let Some(line) = report {
        error!("{line}");
    }
    Ok(code)
}

/// Exit code and closing error line for a finished wait. An exceeded
/// timeout outranks recorded worker failures.
fn closing_report(outcome: WaitOutcome, has_failed: bool) -> (i32, Option<&'static str>) {
    match outcome {
        // The wait ends here; the workers themselves are left running.
        WaitOutcome::TimedOut => (1, Some("timeout is exceeded, probably still syncing")),
        WaitOutcome::Completed if has_failed => (1, Some("can't sync some data")),
        WaitOutcome::Completed => (0, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_report_outranks_recorded_failures() {
        let (code, report) = closing_report(WaitOutcome::TimedOut, true);
        assert_eq!(code, 1);
        assert_eq!(report, Some("timeout is exceeded, probably still syncing"));
    }

    #[test]
    fn failures_surface_once_the_wait_completes() {
        let (code, report) = closing_report(WaitOutcome::Completed, true);
        assert_eq!(code, 1);
        assert_eq!(report, Some("can't sync some data"));
    }

    #[test]
    fn a_clean_run_exits_zero_without_a_report() {
        assert_eq!(closing_report(WaitOutcome::Completed, false), (0, None));
    }
}
