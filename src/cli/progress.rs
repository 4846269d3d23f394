use archive_renamer::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Spinner while scanning, bar while renaming.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICKS));
        }
        pb.set_message("Scanning tree...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_complete(&self, entries: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} entries in {:.2}s",
            entries, duration_secs
        );
    }

    fn on_plan_complete(&self, folder_ops: usize, file_ops: usize, skipped: usize) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Plan: {} folder renames, {} file renames, {} skipped",
            folder_ops, file_ops, skipped
        );
    }

    fn on_execute_start(&self, total: usize, dry_run: bool) {
        let pb = ProgressBar::new(total as u64);
        let verb = if dry_run { "Simulating" } else { "Renaming" };
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
            verb
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICKS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_execute_progress(&self, done: usize, _total: usize, _current_path: &str) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(done as u64);
            }
        }
    }

    fn on_execute_complete(&self, applied: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        let mark = if failed == 0 {
            "\x1b[32m✓\x1b[0m"
        } else {
            "\x1b[33m!\x1b[0m"
        };
        eprintln!(
            "  {} {} renames, {} failed in {:.2}s",
            mark, applied, failed, duration_secs
        );
    }
}
