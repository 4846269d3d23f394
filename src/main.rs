mod cli;

use anyhow::{anyhow, Context, Result};
use archive_renamer::config::{load_configuration, AppConfig};
use archive_renamer::runlog::summary::{find_last_log, summarize, write_csv, LogSummary};
use archive_renamer::runlog::undo::{apply_undo, build_undo_plan, undo_log_path, UndoOptions};
use archive_renamer::{
    Confirm, Outcome, RenameEngine, RunLog, RunMode, RunRecord, RunStatus, StdFs, Tag,
};
use clap::{CommandFactory, Parser};
use cli::commands::{Cli, Commands};
use cli::logging;
use cli::progress::CliReporter;
use cli::prompt::ConsolePrompt;
use colored::*;
use dotenv::dotenv;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_FAILED: u8 = 1;
const EXIT_DECLINED: u8 = 2;

fn main() -> ExitCode {
    dotenv().ok();

    let args = Cli::parse();

    // The diagnostic log must not land inside the tree about to be renamed.
    let run_root = match &args.command {
        Some(Commands::Run { root, .. }) => {
            Some(root.clone().unwrap_or_else(|| PathBuf::from(".")))
        }
        _ => None,
    };
    let _guard = logging::init_logger(run_root.as_deref());

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::from(EXIT_FAILED);
        }
    };

    let result = match args.command {
        Some(Commands::Run { root, dry_run, yes }) => run_rename(config, root, dry_run, yes),
        Some(Commands::Summary {
            log,
            last,
            json,
            csv,
        }) => run_summary(log, last, json, csv),
        Some(Commands::Undo {
            log,
            dry_run,
            force,
            limit,
            yes,
        }) => run_undo(
            &config,
            &log,
            UndoOptions {
                dry_run,
                force,
                limit,
            },
            yes,
        ),
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run_rename(
    mut config: AppConfig,
    root: Option<PathBuf>,
    dry_run: bool,
    yes: bool,
) -> Result<ExitCode> {
    let prompt = ConsolePrompt::new();
    let root = match root {
        Some(root) => root,
        None => {
            let cwd = env::current_dir().context("cannot read current directory")?;
            let question = format!("Run in current directory {}?", cwd.display());
            if !yes && !prompt.confirm(&question) {
                info!("Aborted by operator");
                return Ok(ExitCode::from(EXIT_DECLINED));
            }
            cwd
        }
    };
    if yes {
        config.assume_yes = true;
    }

    let mode = if dry_run {
        RunMode::DryRun
    } else {
        RunMode::Real
    };
    let engine = RenameEngine::new(config);
    let reporter = CliReporter::new();
    let record = engine.run(&root, mode, &prompt, &reporter)?;

    print_record(&record);

    Ok(match record.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Cancelled => ExitCode::from(EXIT_DECLINED),
        RunStatus::CompletedWithErrors | RunStatus::Aborted => ExitCode::from(EXIT_FAILED),
    })
}

fn print_record(record: &RunRecord) {
    println!();
    info!(
        "{} run on {}: {}",
        record.mode,
        record.root.display(),
        status_colored(record.status)
    );
    info!(
        "{} applied, {} would apply, {} failed, {} rolled back, {} skipped",
        format!("{}", record.count(Outcome::Applied)).green(),
        format!("{}", record.count(Outcome::WouldApply)).cyan(),
        format!("{}", record.count(Outcome::Failed)).red(),
        format!("{}", record.count(Outcome::RolledBack)).yellow(),
        record.count(Outcome::Skipped),
    );
    for kept in record.events_tagged(Tag::TempDirKept) {
        info!("Staging directory left in place: {}", kept.message.yellow());
    }
    if let Some(failure) = &record.failure {
        error!("Run aborted: {}", failure);
        if failure.is_precondition() {
            info!("Nothing on disk was changed");
        }
    }
    match &record.log_path {
        Some(path) => info!("Run log: {}", path.display()),
        None => info!("Run log was not written to disk"),
    }
}

fn status_colored(status: RunStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        RunStatus::Completed => text.green(),
        RunStatus::CompletedWithErrors | RunStatus::Cancelled => text.yellow(),
        RunStatus::Aborted => text.red(),
    }
}

fn run_summary(
    log: Option<PathBuf>,
    last: bool,
    json: bool,
    csv: Option<PathBuf>,
) -> Result<ExitCode> {
    let path = match (log, last) {
        (Some(path), _) => path,
        (None, _) => {
            let cwd = env::current_dir().context("cannot read current directory")?;
            find_last_log(&cwd)?
                .ok_or_else(|| anyhow!("no run log found in {}", cwd.display()))?
        }
    };

    let summary = summarize(&path).with_context(|| format!("reading {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if let Some(out) = csv {
        let file = File::create(&out).with_context(|| format!("creating {}", out.display()))?;
        write_csv(&summary, file)?;
        info!("Wrote {}", out.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &LogSummary) {
    println!("{} {}", "Log:".bold(), summary.log.display());
    println!(
        "{} {}",
        "Root:".bold(),
        summary.root.as_deref().unwrap_or("?")
    );
    println!(
        "{} {}",
        "Mode:".bold(),
        summary.mode.as_deref().unwrap_or("?")
    );
    println!(
        "{} {} .. {}",
        "Time:".bold(),
        summary.started.as_deref().unwrap_or("?"),
        summary.finished.as_deref().unwrap_or("?")
    );
    println!(
        "{} {}",
        "Status:".bold(),
        summary.status.as_deref().unwrap_or("unfinished")
    );
    if summary.is_dry_run() {
        println!("Planned renames: {}", format!("{}", summary.planned).cyan());
    }
    println!(
        "Renamed: {} folders, {} files",
        format!("{}", summary.renamed_dirs.len()).green(),
        format!("{}", summary.renamed_files.len()).green()
    );
    println!(
        "Rolled back: {}",
        format!("{}", summary.rolled_back.len()).yellow()
    );
    println!("Skipped: {}", summary.skipped);
    println!(
        "Warnings: {}, errors: {}",
        format!("{}", summary.warnings.len()).yellow(),
        format!("{}", summary.errors.len()).red()
    );
    for err in &summary.errors {
        println!("  {}", err.red());
    }
    for kept in &summary.kept_staging {
        println!("  staging left in place: {}", kept.yellow());
    }
    if summary.unparsed_lines > 0 {
        println!("Unparsed lines: {}", summary.unparsed_lines);
    }
}

fn run_undo(config: &AppConfig, log: &Path, options: UndoOptions, yes: bool) -> Result<ExitCode> {
    let summary = summarize(log).with_context(|| format!("reading {}", log.display()))?;
    let plan = build_undo_plan(&summary);
    if plan.is_empty() {
        info!("Nothing to undo in {}", log.display());
        return Ok(ExitCode::SUCCESS);
    }

    if !options.dry_run && !yes && !config.assume_yes {
        let question = format!(
            "Undo {} file and {} folder renames from {}?",
            plan.files.len(),
            plan.dirs.len(),
            log.display()
        );
        if !ConsolePrompt::new().confirm(&question) {
            info!("Aborted by operator");
            return Ok(ExitCode::from(EXIT_DECLINED));
        }
    }

    let root = summary
        .root
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| log.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mode = if options.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Real
    };
    let undo_path = (!options.dry_run).then(|| undo_log_path(log));
    let mut undo_log = RunLog::open(&root, mode, undo_path);
    undo_log.info(Tag::Start, format!("root={}", root.display()));
    undo_log.info(Tag::Mode, mode.to_string());
    undo_log.info(
        Tag::Plan,
        format!("undo of {}: {} steps", log.display(), plan.len()),
    );

    let report = apply_undo(&plan, &options, &StdFs, &mut undo_log);
    let status = if report.failed > 0 || report.skipped > 0 {
        RunStatus::CompletedWithErrors
    } else {
        RunStatus::Completed
    };
    let record = undo_log.finish(status, None);

    info!(
        "Undo {}: {} moved, {} would move, {} skipped, {} failed",
        status_colored(status),
        format!("{}", report.moved).green(),
        format!("{}", report.would_move).cyan(),
        format!("{}", report.skipped).yellow(),
        format!("{}", report.failed).red()
    );
    for backup in &report.backups {
        info!("Backed up existing entry to {}", backup.display());
    }
    if let Some(path) = &record.log_path {
        info!("Undo log: {}", path.display());
    }

    Ok(if status == RunStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    })
}

fn print_config(config: &AppConfig) -> Result<ExitCode> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}
