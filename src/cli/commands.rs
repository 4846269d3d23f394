use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "archive-renamer")]
#[command(about = "Normalize and rename scanned archive trees", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize folder names and sequence files under ROOT
    Run {
        /// Archive root; asks to use the current directory when omitted
        root: Option<PathBuf>,
        /// Log what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Summarize a run log
    Summary {
        /// Log file to read
        log: Option<PathBuf>,
        /// Use the newest run log in the current directory
        #[arg(long, conflicts_with = "log")]
        last: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Also write applied renames to a CSV file
        #[arg(long, value_name = "OUT")]
        csv: Option<PathBuf>,
    },
    /// Reverse the renames recorded in a run log
    Undo {
        log: PathBuf,
        /// Log what would be moved without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Move existing entries at original names aside instead of skipping
        #[arg(long)]
        force: bool,
        /// Undo at most N file and N folder renames (0 = all)
        #[arg(long, value_name = "N", default_value_t = 0)]
        limit: usize,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print configuration values
    PrintConfig,
}
