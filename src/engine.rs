use crate::config::{AppConfig, MAX_RELATIVE_DEPTH};
use crate::error::Error;
use crate::executor::{Executor, FsBackend, RunMode, StdFs};
use crate::planner;
use crate::progress::ProgressReporter;
use crate::prompt::Confirm;
use crate::runlog::{Outcome, RunLog, RunRecord, RunStatus, Tag};
use crate::scanner::{self, RootSelection, TreeSnapshot};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Per-run state: the root, the mode and the log every step writes to.
pub struct RunContext {
    root: RootSelection,
    pub mode: RunMode,
    pub log: RunLog,
}

impl RunContext {
    pub fn new(root: RootSelection, mode: RunMode, log: RunLog) -> Self {
        Self { root, mode, log }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn finish(self, status: RunStatus, failure: Option<Error>) -> RunRecord {
        self.log.finish(status, failure)
    }
}

pub struct RenameEngine<B: FsBackend = StdFs> {
    config: AppConfig,
    backend: B,
}

impl RenameEngine<StdFs> {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            backend: StdFs,
        }
    }
}

impl<B: FsBackend> RenameEngine<B> {
    pub fn with_backend<C: FsBackend>(self, backend: C) -> RenameEngine<C> {
        RenameEngine {
            config: self.config,
            backend,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Snapshot, validate, plan and (after confirmation) apply one root.
    ///
    /// Returns `Err` only if the root itself is unusable, before any log is
    /// opened. Every later failure ends up in the returned record with status
    /// [`RunStatus::Aborted`].
    pub fn run(
        &self,
        root: &Path,
        mode: RunMode,
        confirm: &dyn Confirm,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunRecord, Error> {
        let root = RootSelection::new(root)?;
        let log = RunLog::for_run(root.path(), mode, self.config.log_dir());
        let mut ctx = RunContext::new(root, mode, log);

        ctx.log
            .info(Tag::Start, format!("root={}", ctx.root().display()));
        ctx.log.info(Tag::Mode, mode.to_string());

        match self.run_steps(&mut ctx, confirm, reporter) {
            Ok(status) => Ok(ctx.finish(status, None)),
            Err(err) => {
                ctx.log.error(Tag::Abort, err.to_string());
                Ok(ctx.finish(RunStatus::Aborted, Some(err)))
            }
        }
    }

    fn run_steps(
        &self,
        ctx: &mut RunContext,
        confirm: &dyn Confirm,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunStatus, Error> {
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let snapshot = TreeSnapshot::capture(&ctx.root, &self.config)?;
        reporter.on_scan_complete(snapshot.entries.len(), scan_start.elapsed().as_secs_f64());
        debug!(
            "Captured {} entries ({} excluded)",
            snapshot.entries.len(),
            snapshot.excluded.len()
        );

        let tree = match scanner::validate_tree(&snapshot, MAX_RELATIVE_DEPTH) {
            Ok(tree) => tree,
            Err(err) => {
                if let Error::DepthExceeded {
                    found, violations, ..
                } = &err
                {
                    ctx.log.info(
                        Tag::MaxDepth,
                        format!("Max relative folder depth found: {}", found),
                    );
                    for path in violations {
                        ctx.log
                            .error(Tag::MaxDepth, format!("too deep: {}", path.display()));
                    }
                }
                return Err(err);
            }
        };
        ctx.log.info(
            Tag::MaxDepth,
            format!("Max relative folder depth found: {}", tree.max_depth()),
        );

        let plan = planner::plan(tree, &self.config)?;
        ctx.log.info(
            Tag::Plan,
            format!(
                "{} folder renames, {} file renames, {} files skipped",
                plan.folder_ops.len(),
                plan.file_ops.len(),
                plan.skipped.len()
            ),
        );
        for warning in &plan.warnings {
            ctx.log.warn(Tag::Warning, warning.to_string());
        }
        for skipped in &plan.skipped {
            ctx.log.info(
                Tag::Skip,
                format!("{} ({})", skipped.path.display(), skipped.reason),
            );
        }
        reporter.on_plan_complete(plan.folder_ops.len(), plan.file_ops.len(), plan.skipped.len());

        if plan.is_empty() {
            info!("Nothing to rename under {}", ctx.root().display());
            return Ok(RunStatus::Completed);
        }

        if ctx.mode == RunMode::Real && !self.config.assume_yes {
            let question = format!(
                "Rename {} folders and {} files under {}?",
                plan.folder_ops.len(),
                plan.file_ops.len(),
                ctx.root().display()
            );
            if !confirm.confirm(&question) {
                for op in plan.operations() {
                    ctx.log.record(op, Outcome::Skipped, "cancelled");
                }
                ctx.log.info(Tag::Cancelled, "operator declined");
                return Ok(RunStatus::Cancelled);
            }
        }

        let summary = Executor::new(&self.backend, reporter).execute(&plan, ctx)?;
        info!(
            "Applied {}, would apply {}, failed {}",
            summary.applied, summary.would_apply, summary.failed
        );

        Ok(if summary.failed > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        })
    }
}
