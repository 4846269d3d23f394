use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extensions that take part in the file pass, compared lowercase.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["tif", "tiff", "jpg", "jpeg", "png", "pdf"];

/// Deepest containing-folder depth (relative to the root) a file may sit at.
pub const MAX_RELATIVE_DEPTH: usize = 4;

/// Number of ancestor tokens in a generated file name.
pub const ANCESTOR_SLOTS: usize = 4;

/// Stand-in for a missing ancestor or a folder name that normalizes to nothing.
pub const PLACEHOLDER: &str = "x";

pub const SEQUENCE_WIDTH: usize = 4;

pub const STAGING_PREFIX: &str = "._tmp_archive_renamer_";
pub const LOG_PREFIX: &str = "archive_rename_log_";
pub const UNDO_LOG_PREFIX: &str = "undo_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOrder {
    /// Plain string comparison of the current file names.
    #[default]
    Lexical,
    /// Digit runs compare numerically, text compares case-insensitively.
    Natural,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ignore_patterns: Vec<String>,
    pub file_order: FileOrder,
    pub tidy_separators: bool,
    pub log_dir: Option<String>,
    pub assume_yes: bool,
}

impl AppConfig {
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref().map(Path::new)
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into().to_string_lossy().into_owned());
        self
    }
}

/// Load `Config.toml` from the working directory (optional), then apply
/// `ARCHIVE_RENAMER_*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("ARCHIVE_RENAMER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

pub fn is_allowed_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions_case_insensitive() {
        assert!(is_allowed_extension("TIF"));
        assert!(is_allowed_extension(".Jpeg"));
        assert!(is_allowed_extension("pdf"));
        assert!(!is_allowed_extension("txt"));
        assert!(!is_allowed_extension(""));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(config.file_order, FileOrder::Lexical);
        assert!(!config.tidy_separators);
        assert!(config.log_dir().is_none());
        assert!(!config.assume_yes);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = AppConfig {
            ignore_patterns: vec!["**/Thumbs.db".to_string()],
            file_order: FileOrder::Natural,
            tidy_separators: true,
            log_dir: Some("/var/log/archive".to_string()),
            assume_yes: false,
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("file_order = \"natural\""));
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.file_order, FileOrder::Natural);
        assert_eq!(parsed.ignore_patterns, config.ignore_patterns);
    }
}
