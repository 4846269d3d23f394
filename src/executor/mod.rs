//! Applies a [`RenamePlan`] to disk, or simulates it.
//!
//! Folder renames run one at a time, deepest first, each through a staging
//! directory in its parent. The first folder failure rolls back every folder
//! rename already applied in this run and aborts. File renames run per leaf
//! folder in two phases (into staging under the target names, then out), so
//! names inside one folder can be permuted without clobbering each other.
//! File failures are recorded and do not abort.

pub mod backend;
pub mod staging;

pub use backend::{FsBackend, StdFs};
pub use staging::{staging_name, StagingArea};

use crate::engine::RunContext;
use crate::error::Error;
use crate::planner::{guard_root, RenameOperation, RenamePlan};
use crate::progress::ProgressReporter;
use crate::runlog::{Outcome, Tag};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunMode {
    DryRun,
    Real,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::Real => write!(f, "real"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub would_apply: usize,
    pub applied: usize,
    pub failed: usize,
    pub rolled_back: usize,
    /// Staging directories that could not be removed.
    pub kept_staging: Vec<PathBuf>,
}

pub struct Executor<'a, B: FsBackend + ?Sized> {
    backend: &'a B,
    reporter: &'a dyn ProgressReporter,
    staging_name: String,
}

impl<'a, B: FsBackend + ?Sized> Executor<'a, B> {
    pub fn new(backend: &'a B, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            backend,
            reporter,
            staging_name: staging_name(),
        }
    }

    /// Run every operation of `plan` in the context's mode.
    ///
    /// Returns `Err` only when the run has to abort: the root guard trips or
    /// a folder rename fails. By then the failure and any rollback are in the
    /// context's log.
    pub fn execute(&self, plan: &RenamePlan, ctx: &mut RunContext) -> Result<ExecutionSummary, Error> {
        for op in plan.operations() {
            guard_root(op, ctx.root())?;
        }

        let start = Instant::now();
        let total = plan.len();
        self.reporter.on_execute_start(total, ctx.mode.is_dry_run());

        let result = if ctx.mode.is_dry_run() {
            Ok(self.simulate(plan, ctx))
        } else {
            self.apply(plan, ctx)
        };

        let (applied, failed) = match &result {
            Ok(summary) => (summary.applied + summary.would_apply, summary.failed),
            Err(_) => (0, 1),
        };
        self.reporter
            .on_execute_complete(applied, failed, start.elapsed().as_secs_f64());
        result
    }

    fn simulate(&self, plan: &RenamePlan, ctx: &mut RunContext) -> ExecutionSummary {
        let total = plan.len();
        let mut summary = ExecutionSummary::default();
        for (i, op) in plan.operations().enumerate() {
            ctx.log.record(op, Outcome::WouldApply, "");
            summary.would_apply += 1;
            self.progress(i + 1, total, op);
        }
        summary
    }

    fn apply(&self, plan: &RenamePlan, ctx: &mut RunContext) -> Result<ExecutionSummary, Error> {
        let total = plan.len();
        let mut done = 0;
        let mut summary = ExecutionSummary::default();
        let mut applied_folders: Vec<&RenameOperation> = Vec::new();

        for op in &plan.folder_ops {
            match self.rename_folder(op, ctx) {
                Ok(()) => {
                    ctx.log.record(op, Outcome::Applied, "");
                    applied_folders.push(op);
                    summary.applied += 1;
                }
                Err(err) => {
                    ctx.log.record(op, Outcome::Failed, source_message(&err));
                    summary.failed += 1;
                    summary.rolled_back = self.roll_back(&applied_folders, ctx);
                    return Err(err);
                }
            }
            done += 1;
            self.progress(done, total, op);
        }

        for batch in plan
            .file_ops
            .chunk_by(|a, b| a.resolved_parent == b.resolved_parent)
        {
            self.rename_file_batch(batch, ctx, &mut summary);
            done += batch.len();
            if let Some(last) = batch.last() {
                self.progress(done, total, last);
            }
        }

        Ok(summary)
    }

    fn rename_folder(&self, op: &RenameOperation, ctx: &mut RunContext) -> Result<(), Error> {
        let source = op.resolved_source();
        let target = op.target_path();
        let mutation = |source_err: io::Error| Error::Mutation {
            path: source.clone(),
            target: target.clone(),
            source: source_err,
        };

        let staging = StagingArea::create(self.backend, &op.resolved_parent, &self.staging_name)
            .map_err(&mutation)?;
        let slot = staging.slot(&op.target_name);
        debug!("Staging {} via {}", source.display(), staging.path().display());

        if let Err(e) = self.backend.rename(&source, &slot) {
            self.keep_staging(&staging, ctx);
            return Err(mutation(e));
        }

        let placed = if self.backend.exists(&target) {
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "target already exists",
            ))
        } else {
            self.backend.rename(&slot, &target)
        };

        match placed {
            Ok(()) => {
                self.discard_staging(&staging, ctx);
                Ok(())
            }
            Err(e) => {
                if self.backend.rename(&slot, &source).is_err() {
                    warn!(
                        "Could not move {} back out of staging",
                        source.display()
                    );
                }
                self.keep_staging(&staging, ctx);
                Err(mutation(e))
            }
        }
    }

    /// Undo applied folder renames, newest first. Returns how many succeeded.
    fn roll_back(&self, applied: &[&RenameOperation], ctx: &mut RunContext) -> usize {
        if applied.is_empty() {
            return 0;
        }
        info!("Rolling back {} folder renames", applied.len());

        let mut restored = 0;
        for op in applied.iter().rev() {
            let from = op.target_path();
            let to = op.resolved_source();
            let result = if self.backend.exists(&to) {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "original name is taken",
                ))
            } else {
                self.backend.rename(&from, &to)
            };
            match result {
                Ok(()) => {
                    ctx.log.record(op, Outcome::RolledBack, "");
                    restored += 1;
                }
                Err(e) => ctx.log.error(
                    Tag::ErrorRollback,
                    format!("{} -> {} : {}", from.display(), to.display(), e),
                ),
            }
        }
        restored
    }

    fn rename_file_batch(
        &self,
        batch: &[RenameOperation],
        ctx: &mut RunContext,
        summary: &mut ExecutionSummary,
    ) {
        let Some(first) = batch.first() else {
            return;
        };
        let leaf = &first.resolved_parent;

        let staging = match StagingArea::create(self.backend, leaf, &self.staging_name) {
            Ok(staging) => staging,
            Err(e) => {
                let note = format!("cannot create staging directory in {}: {}", leaf.display(), e);
                for op in batch {
                    ctx.log.record(op, Outcome::Failed, note.clone());
                }
                summary.failed += batch.len();
                return;
            }
        };
        ctx.log
            .info(Tag::TempDirCreated, staging.path().display().to_string());

        let mut staged = Vec::with_capacity(batch.len());
        for op in batch {
            let slot = staging.slot(&op.target_name);
            match self.backend.rename(&op.resolved_source(), &slot) {
                Ok(()) => staged.push((op, slot)),
                Err(e) => {
                    ctx.log.record(op, Outcome::Failed, e.to_string());
                    summary.failed += 1;
                }
            }
        }

        let mut stranded = false;
        for (op, slot) in staged {
            let target = op.target_path();
            let placed = if self.backend.exists(&target) {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "target already exists",
                ))
            } else {
                self.backend.rename(&slot, &target)
            };

            match placed {
                Ok(()) => {
                    ctx.log.record(op, Outcome::Applied, "");
                    summary.applied += 1;
                }
                Err(e) => {
                    let note = if self.restore_file(&slot, &op.resolved_source()) {
                        format!("{}; kept original name", e)
                    } else {
                        stranded = true;
                        format!("{}; left at {}", e, slot.display())
                    };
                    ctx.log.record(op, Outcome::Failed, note);
                    summary.failed += 1;
                }
            }
        }

        if stranded {
            self.keep_staging(&staging, ctx);
            summary.kept_staging.push(staging.path().to_path_buf());
        } else if !self.discard_staging(&staging, ctx) {
            summary.kept_staging.push(staging.path().to_path_buf());
        }
    }

    fn restore_file(&self, slot: &Path, original: &Path) -> bool {
        !self.backend.exists(original) && self.backend.rename(slot, original).is_ok()
    }

    /// Leave a staging directory on disk after a failure and report it.
    fn keep_staging(&self, staging: &StagingArea, ctx: &mut RunContext) {
        ctx.log
            .warn(Tag::TempDirKept, staging.path().display().to_string());
    }

    /// Remove an emptied staging directory. Returns false if it had to stay.
    fn discard_staging(&self, staging: &StagingArea, ctx: &mut RunContext) -> bool {
        match staging.remove(self.backend) {
            Ok(()) => {
                debug!("Removed {}", staging.path().display());
                true
            }
            Err(e) => {
                ctx.log.warn(
                    Tag::TempDirKept,
                    format!("{} : {}", staging.path().display(), e),
                );
                false
            }
        }
    }

    fn progress(&self, done: usize, total: usize, op: &RenameOperation) {
        self.reporter
            .on_execute_progress(done, total, &op.source_path.to_string_lossy());
    }
}

fn source_message(err: &Error) -> String {
    match err {
        Error::Mutation { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
