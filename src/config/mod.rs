//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, then `V2E_STUDY_*` environment variables.
//!
//! ```toml
//! database_path = "/var/lib/v2e/study.db"
//! page_size = 25
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [mastery]
//! mastered = 0.9
//! learning = 0.7
//! ```

use crate::observability::{LogFormat, LoggingSettings};
use crate::services::scheduler::MasteryThresholds;
use crate::services::DEFAULT_PAGE_SIZE;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const ENV_DATABASE: &str = "V2E_STUDY_DB";
/// Environment variable overriding the log format.
pub const ENV_LOG_FORMAT: &str = "V2E_STUDY_LOG_FORMAT";

const APP_DIR: &str = "v2e-study";

/// Main configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    /// Path of the `SQLite` database.
    pub database_path: PathBuf,
    /// Default page size for bookmark listings.
    pub page_size: usize,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Mastery thresholds for learning-state updates.
    pub mastery: MasteryThresholds,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            page_size: DEFAULT_PAGE_SIZE,
            logging: LoggingSettings::default(),
            mastery: MasteryThresholds::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Page size.
    pub page_size: Option<usize>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Mastery thresholds section.
    pub mastery: Option<MasteryThresholds>,
}

impl StudyConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `explicit` if given, otherwise the default location, then
    /// applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::store("read_config_file", format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed TOML and
    /// [`Error::InvalidInput`] for out-of-range values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::Parse(format!("config file: {e}")))?;
        let config = Self::from_config_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `<config_dir>/v2e-study/config.toml`.
    ///
    /// Returns the defaults if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs.config_dir().join(APP_DIR).join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Applies `V2E_STUDY_*` overrides looked up through `lookup`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_DATABASE).filter(|p| !p.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = LogFormat::parse(&format);
        }
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(page_size) = file.page_size {
            config.page_size = page_size;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(mastery) = file.mastery {
            config.mastery = mastery;
        }

        config
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be positive".to_string()));
        }
        let MasteryThresholds { mastered, learning } = self.mastery;
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(mastered) || !in_range(learning) || learning > mastered {
            return Err(Error::InvalidInput(format!(
                "mastery thresholds must satisfy 0 <= learning ({learning}) <= mastered ({mastered}) <= 1"
            )));
        }
        Ok(())
    }
}

/// `<data_dir>/v2e-study/study.db`, or `.v2e-study/study.db` when the
/// platform has no data directory.
#[must_use]
pub fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".v2e-study").join("study.db"),
        |dirs| dirs.data_dir().join(APP_DIR).join("study.db"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StudyConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.database_path.ends_with("study.db"));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StudyConfig::from_toml(
            r#"
            page_size = 10

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.mastery, MasteryThresholds::default());
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            StudyConfig::from_toml("page_size = 0"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            StudyConfig::from_toml("[mastery]\nmastered = 0.5\nlearning = 0.8"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            StudyConfig::from_toml("page_size = \"ten\""),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            StudyConfig::from_toml("unknown_key = 1"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/x/study.db\"").unwrap();
        let config = StudyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/x/study.db"));

        let missing = StudyConfig::load_from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(missing, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_DATABASE, "/data/study.db"), (ENV_LOG_FORMAT, "json")]);
        let config = StudyConfig::default()
            .with_overrides(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.database_path, PathBuf::from("/data/study.db"));
        assert_eq!(config.logging.format, LogFormat::Json);

        let unchanged = StudyConfig::default().with_overrides(|_| None);
        assert_eq!(unchanged, StudyConfig::default());
    }
}
