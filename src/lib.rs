pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod planner;
pub mod progress;
pub mod prompt;
pub mod runlog;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{RenameEngine, RunContext};
pub use error::Error;
pub use executor::{Executor, FsBackend, RunMode, StdFs};
pub use planner::{RenameOperation, RenamePlan};
pub use progress::{ProgressReporter, SilentReporter};
pub use prompt::{AssumeNo, AssumeYes, Confirm};
pub use runlog::{Outcome, RunLog, RunRecord, RunStatus, Tag};
