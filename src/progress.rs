/// Hooks for reporting run progress.
///
/// The CLI implements these with indicatif bars; library callers can ignore
/// them. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _entries: usize, _duration_secs: f64) {}
    fn on_plan_complete(&self, _folder_ops: usize, _file_ops: usize, _skipped: usize) {}
    fn on_execute_start(&self, _total: usize, _dry_run: bool) {}
    fn on_execute_progress(&self, _done: usize, _total: usize, _current_path: &str) {}
    fn on_execute_complete(&self, _applied: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
