use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::sync::SyncState;

use super::meminfo::{self, MeminfoSample};

/// Wall-clock allowance for the wait loop. Exceeded only strictly past
/// the limit; landing exactly on it does not count.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn starting_now(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.start.elapsed() > self.limit
    }
}

/// How the wait loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every worker terminated.
    Completed,
    /// The deadline passed with workers still running.
    TimedOut,
}

/// Renders one progress line per period until the workers are done or the
/// deadline passes.
pub struct ProgressMonitor {
    source: PathBuf,
    period: Duration,
}

impl ProgressMonitor {
    pub fn new(period: Duration) -> Self {
        Self::with_source(PathBuf::from(meminfo::MEMINFO_PATH), period)
    }

    pub fn with_source(source: PathBuf, period: Duration) -> Self {
        Self { source, period }
    }

    /// Drive the wait loop. Each tick takes a fresh counter reading, reads
    /// the worker count once, and overdraws the progress line in place, so
    /// the rendered count is the one the exit checks saw. A deadline stops
    /// only the waiting; the workers themselves are left running.
    ///
    /// Render failures are ignored; losing the progress line must not
    /// disturb the run.
    pub async fn run<W: Write>(
        &self,
        state: &SyncState,
        deadline: Option<&Deadline>,
        out: &mut W,
    ) -> WaitOutcome {
        let outcome = loop {
            let sample = MeminfoSample::read(&self.source).await;
            let active = state.active_count();

            let _ = write!(
                out,
                "\rDirty: {}, Writeback: {}, processes: {}",
                sample.dirty_display(),
                sample.writeback_display(),
                active
            );
            let _ = out.flush();

            // Completion wins when both conditions hold on the same tick.
            if active == 0 {
                break WaitOutcome::Completed;
            }
            if deadline.map_or(false, Deadline::exceeded) {
                break WaitOutcome::TimedOut;
            }

            tokio::time::sleep(self.period).await;
        };

        // Leave the last progress line behind instead of overdrawing it.
        let _ = writeln!(out);
        outcome
    }
}
