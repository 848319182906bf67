pub mod meminfo;
pub mod progress;

pub use progress::{Deadline, ProgressMonitor, WaitOutcome};
