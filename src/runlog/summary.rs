use super::{read_lines, LogLine, Tag};
use crate::config::LOG_PREFIX;
use crate::error::Error;
use glob::Pattern;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
}

/// What a run log says happened.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogSummary {
    pub log: PathBuf,
    pub root: Option<String>,
    pub mode: Option<String>,
    pub started: Option<String>,
    pub finished: Option<String>,
    /// Body of the FINISHED line.
    pub status: Option<String>,
    pub max_depth: Option<String>,
    pub planned: usize,
    pub renamed_dirs: Vec<RenameEntry>,
    pub renamed_files: Vec<RenameEntry>,
    pub rolled_back: Vec<RenameEntry>,
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub kept_staging: Vec<String>,
    pub lines: usize,
    pub unparsed_lines: usize,
}

impl LogSummary {
    pub fn is_dry_run(&self) -> bool {
        self.mode.as_deref() == Some("dry-run")
    }

    pub fn aborted(&self) -> bool {
        self.status.as_deref() == Some("aborted")
    }
}

pub fn summarize(path: &Path) -> Result<LogSummary, Error> {
    let lines = read_lines(path)?;
    Ok(summarize_lines(path, &lines))
}

pub fn summarize_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> LogSummary {
    let mut summary = LogSummary {
        log: path.to_path_buf(),
        ..LogSummary::default()
    };

    for raw in lines {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        summary.lines += 1;
        let Some(line) = LogLine::parse(raw) else {
            summary.unparsed_lines += 1;
            continue;
        };
        let timestamp = line.timestamp.map(|t| t.to_rfc3339());

        match line.tag {
            Tag::Start => {
                summary.started = timestamp;
                summary.root = line.body.strip_prefix("root=").map(str::to_string);
            }
            Tag::Mode => summary.mode = Some(line.body.clone()),
            Tag::MaxDepth if summary.max_depth.is_none() => {
                summary.max_depth = line.body.rsplit(' ').next().map(str::to_string);
            }
            Tag::WouldRenameDir | Tag::WouldRenameFile => summary.planned += 1,
            Tag::RenamedDir => push_pair(&mut summary.renamed_dirs, &line),
            Tag::RenamedFile => push_pair(&mut summary.renamed_files, &line),
            Tag::RollbackDir => push_pair(&mut summary.rolled_back, &line),
            Tag::Skip | Tag::SkippedRename => summary.skipped += 1,
            Tag::Warning => summary.warnings.push(line.body.clone()),
            Tag::TempDirKept => summary.kept_staging.push(line.body.clone()),
            Tag::Finished => {
                summary.finished = timestamp;
                summary.status = Some(line.body.clone());
            }
            _ => {}
        }

        if line.level == super::Level::Error {
            summary.errors.push(format!("{}: {}", line.tag, line.body));
        }
    }

    debug!(
        "Summarized {}: {} lines, {} unparsed",
        path.display(),
        summary.lines,
        summary.unparsed_lines
    );
    summary
}

fn push_pair(target: &mut Vec<RenameEntry>, line: &LogLine) {
    if let Some((from, to)) = line.rename_pair() {
        target.push(RenameEntry { from, to });
    }
}

/// Newest run log in `dir`, by the timestamp in its name.
pub fn find_last_log(dir: &Path) -> Result<Option<PathBuf>, Error> {
    let pattern = format!(
        "{}/{}*.log",
        Pattern::escape(&dir.to_string_lossy()),
        LOG_PREFIX
    );
    let mut logs: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    logs.sort();
    Ok(logs.pop())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    kind: &'static str,
    from: &'a str,
    to: &'a str,
}

/// One row per applied or rolled back rename.
pub fn write_csv<W: Write>(summary: &LogSummary, writer: W) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let groups = [
        ("folder", &summary.renamed_dirs),
        ("file", &summary.renamed_files),
        ("rollback", &summary.rolled_back),
    ];
    for (kind, entries) in groups {
        for entry in entries {
            wtr.serialize(CsvRow {
                kind,
                from: &entry.from,
                to: &entry.to,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const LOG: &str = "\
2024-03-01T10:00:00+01:00\tINFO\tSTART\troot=/data/archive
2024-03-01T10:00:00+01:00\tINFO\tMODE\treal
2024-03-01T10:00:00+01:00\tINFO\tMAX_DEPTH\tMax relative folder depth found: 3
2024-03-01T10:00:01+01:00\tWARN\tWARNING\t'a' for /data/archive/A is taken, using 'a_dup1'
2024-03-01T10:00:01+01:00\tINFO\tSKIP\t/data/archive/readme.txt (at root level)
2024-03-01T10:00:02+01:00\tINFO\tRENAMED_DIR\t/data/archive/Foo Bar -> /data/archive/foo_bar
2024-03-01T10:00:03+01:00\tINFO\tRENAMED_FILE\t/data/archive/foo_bar/a.tif -> /data/archive/foo_bar/x_x_x_foo_bar_0001.tif
2024-03-01T10:00:03+01:00\tERROR\tERROR_RENAMING_FILE\t/data/archive/foo_bar/b.tif -> /data/archive/foo_bar/x_x_x_foo_bar_0002.tif : denied
this line is not from us
2024-03-01T10:00:04+01:00\tWARN\tFINISHED\tcompleted with errors
";

    #[test]
    fn test_summarize_counts() {
        let lines: Vec<&str> = LOG.lines().collect();
        let summary = summarize_lines(Path::new("run.log"), &lines);
        assert_eq!(summary.root.as_deref(), Some("/data/archive"));
        assert_eq!(summary.mode.as_deref(), Some("real"));
        assert!(!summary.is_dry_run());
        assert_eq!(summary.max_depth.as_deref(), Some("3"));
        assert_eq!(summary.renamed_dirs.len(), 1);
        assert_eq!(summary.renamed_dirs[0].to, "/data/archive/foo_bar");
        assert_eq!(summary.renamed_files.len(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.unparsed_lines, 1);
        assert_eq!(summary.status.as_deref(), Some("completed with errors"));
    }

    #[test]
    fn test_find_last_log() {
        let tmp = tempdir().unwrap();
        assert_eq!(find_last_log(tmp.path()).unwrap(), None);
        for name in [
            "archive_rename_log_20240101_090000.log",
            "archive_rename_log_20240301_120000.log",
            "undo_archive_rename_log_20240401_000000_20240402_000000.log",
            "notes.log",
        ] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        let last = find_last_log(tmp.path()).unwrap().unwrap();
        assert!(last.ends_with("archive_rename_log_20240301_120000.log"));
    }

    #[test]
    fn test_csv_export() {
        let lines: Vec<&str> = LOG.lines().collect();
        let summary = summarize_lines(Path::new("run.log"), &lines);
        let mut out = Vec::new();
        write_csv(&summary, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "kind,from,to");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("folder,/data/archive/Foo Bar,"));
    }
}
