//! Configuration file parser for ~/.config/feedsheet/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos. Command-line flags are layered on top through
//! [`Overrides`] and [`Config::resolve`].
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::{
    default_user_agent, parse_user_date, CrawlOptions, DateRange, DateRangeError, HttpOptions,
};
use crate::util::{validate_feed_url, UrlError};

pub const DEFAULT_FEED_URL: &str = "https://www.uneiaparjour.fr/feed/";
pub const DEFAULT_OUTPUT: &str = "uneiaparjour.ods";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Invalid feed URL")]
    Url(#[from] UrlError),

    #[error(transparent)]
    DateRange(#[from] DateRangeError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Settings read from the config file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed endpoint; pages are requested with `?paged=N`.
    pub feed_url: String,

    /// Spreadsheet written at the end of the run.
    pub output: PathBuf,

    /// Pause between two page fetches, in seconds.
    pub delay_seconds: f64,

    /// Maximum number of articles to export (0 = unlimited).
    pub max_articles: u64,

    /// Hard stop after this many pages (0 = no limit).
    pub max_pages: u32,

    /// Stop after this many consecutive pages with nothing new (0 = never).
    pub max_duplicate_pages: u32,

    pub timeout_seconds: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub user_agent: String,

    /// Crate log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let crawl = CrawlOptions::default();
        let http = HttpOptions::default();
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            delay_seconds: crawl.delay.as_secs_f64(),
            max_articles: 0,
            max_pages: crawl.max_pages,
            max_duplicate_pages: crawl.max_duplicate_pages,
            timeout_seconds: http.timeout.as_secs(),
            retries: http.retries,
            retry_backoff_ms: http.retry_backoff.as_millis() as u64,
            user_agent: default_user_agent(),
            log_level: "info".to_string(),
        }
    }
}

/// Values given on the command line. `None` keeps the config file's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub feed_url: Option<String>,
    pub output: Option<PathBuf>,
    pub max_articles: Option<usize>,
    pub no_paginate: bool,
    pub delay_seconds: Option<f64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub max_pages: Option<u32>,
}

/// Fully validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub feed_url: Url,
    pub output: PathBuf,
    pub crawl: CrawlOptions,
    pub http: HttpOptions,
    pub date_range: DateRange,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "feed_url",
        "output",
        "delay_seconds",
        "max_articles",
        "max_pages",
        "max_duplicate_pages",
        "timeout_seconds",
        "retries",
        "retry_backoff_ms",
        "user_agent",
        "log_level",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory use
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in Self::unknown_keys(&raw) {
                tracing::warn!(key = %key, path = %path.display(), "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), feed_url = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    /// Top-level keys that no setting reads, most likely typos.
    fn unknown_keys(raw: &toml::Table) -> Vec<&str> {
        raw.keys()
            .map(String::as_str)
            .filter(|key| !Self::KNOWN_KEYS.contains(key))
            .collect()
    }

    /// Applies command-line overrides and validates the result.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Url`] - feed URL is not absolute http(s)
    /// - [`ConfigError::InvalidValue`] - negative or non-finite delay, zero
    ///   timeout or max article count
    /// - [`ConfigError::DateRange`] - unparsable date or `from` after `to`
    pub fn resolve(&self, overrides: &Overrides) -> Result<RunConfig, ConfigError> {
        let feed_url = validate_feed_url(overrides.feed_url.as_deref().unwrap_or(&self.feed_url))?;

        let output = overrides
            .output
            .clone()
            .unwrap_or_else(|| self.output.clone());
        if output.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output",
                reason: "path is empty".to_string(),
            });
        }

        let max_articles = match overrides.max_articles {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "max",
                    reason: "must be a positive integer".to_string(),
                })
            }
            Some(n) => Some(n),
            None if self.max_articles == 0 => None,
            None => Some(usize::try_from(self.max_articles).unwrap_or(usize::MAX)),
        };

        let delay_seconds = overrides.delay_seconds.unwrap_or(self.delay_seconds);
        let delay = seconds_to_duration(delay_seconds)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "delay_seconds",
                reason: format!("{} is not a non-negative number of seconds", delay_seconds),
            })?;

        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }

        let from = overrides.from.as_deref().map(parse_user_date).transpose()?;
        let to = overrides.to.as_deref().map(parse_user_date).transpose()?;
        let date_range = DateRange::new(from, to)?;

        Ok(RunConfig {
            feed_url,
            output,
            crawl: CrawlOptions {
                paginate: !overrides.no_paginate,
                max_articles,
                delay,
                max_pages: overrides.max_pages.unwrap_or(self.max_pages),
                max_duplicate_pages: self.max_duplicate_pages,
            },
            http: HttpOptions {
                timeout: Duration::from_secs(self.timeout_seconds),
                retries: self.retries,
                retry_backoff: Duration::from_millis(self.retry_backoff_ms),
                user_agent: self.user_agent.clone(),
            },
            date_range,
        })
    }
}

/// Default config location, `~/.config/feedsheet/config.toml`.
///
/// Returns `None` when `HOME` is unset.
pub fn default_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(env!("CARGO_PKG_NAME"))
            .join("config.toml"),
    )
}

/// `None` for negative, NaN, infinite or overflowing values.
fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedsheet_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.output, PathBuf::from("uneiaparjour.ods"));
        assert_eq!(config.delay_seconds, 1.0);
        assert_eq!(config.max_articles, 0);
        assert_eq!(config.max_pages, 500);
        assert_eq!(config.max_duplicate_pages, 3);
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_backoff_ms, 1000);
        assert!(config.user_agent.starts_with("feedsheet/"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedsheet_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("empty", "");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "delay_seconds = 2.5\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.delay_seconds, 2.5);
        assert_eq!(config.feed_url, DEFAULT_FEED_URL); // default
        assert_eq!(config.retries, 3); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
feed_url = "https://blog.example.com/feed/"
output = "exports/blog.ods"
delay_seconds = 0.5
max_articles = 200
max_pages = 40
max_duplicate_pages = 5
timeout_seconds = 10
retries = 1
retry_backoff_ms = 250
user_agent = "archiver/2.0"
log_level = "debug"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feed_url, "https://blog.example.com/feed/");
        assert_eq!(config.output, PathBuf::from("exports/blog.ods"));
        assert_eq!(config.delay_seconds, 0.5);
        assert_eq!(config.max_articles, 200);
        assert_eq!(config.max_pages, 40);
        assert_eq!(config.max_duplicate_pages, 5);
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.retries, 1);
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.user_agent, "archiver/2.0");
        assert_eq!(config.log_level, "debug");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
retries = 5
totally_fake_key = "should not fail"
"#;
        let (dir, path) = write_config("unknown", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retries, 5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_listed() {
        let raw: toml::Table = "retires = 5\nretries = 2\nfeed_ulr = \"x\"\n".parse().unwrap();
        let mut unknown = Config::unknown_keys(&raw);
        unknown.sort();
        assert_eq!(unknown, vec!["feed_ulr", "retires"]);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_keys_logged_as_warning() {
        let (dir, path) = write_config("typo_logged", "retires = 5\n");

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let config = tracing::subscriber::with_default(subscriber, || Config::load(&path).unwrap());

        assert_eq!(config.retries, 3);
        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Unknown key"), "log output: {}", output);
        assert!(output.contains("retires"), "log output: {}", output);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        // max_pages should be an integer, not a string
        let (dir, path) = write_config("wrongtype", "max_pages = \"many\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_defaults() {
        let run = Config::default().resolve(&Overrides::default()).unwrap();
        assert_eq!(run.feed_url.as_str(), DEFAULT_FEED_URL);
        assert!(run.crawl.paginate);
        assert_eq!(run.crawl.max_articles, None);
        assert_eq!(run.crawl.delay, Duration::from_secs(1));
        assert_eq!(run.http.timeout, Duration::from_secs(30));
        assert!(run.date_range.is_unbounded());
    }

    #[test]
    fn test_resolve_cli_overrides_config() {
        let config = Config {
            max_articles: 50,
            delay_seconds: 3.0,
            max_pages: 10,
            ..Config::default()
        };
        let overrides = Overrides {
            feed_url: Some("http://localhost:8080/feed/".to_string()),
            output: Some(PathBuf::from("out.ods")),
            max_articles: Some(7),
            no_paginate: true,
            delay_seconds: Some(0.0),
            max_pages: Some(2),
            ..Overrides::default()
        };

        let run = config.resolve(&overrides).unwrap();
        assert_eq!(run.feed_url.as_str(), "http://localhost:8080/feed/");
        assert_eq!(run.output, PathBuf::from("out.ods"));
        assert_eq!(run.crawl.max_articles, Some(7));
        assert!(!run.crawl.paginate);
        assert_eq!(run.crawl.delay, Duration::ZERO);
        assert_eq!(run.crawl.max_pages, 2);
    }

    #[test]
    fn test_resolve_config_max_articles() {
        let config = Config {
            max_articles: 25,
            ..Config::default()
        };
        let run = config.resolve(&Overrides::default()).unwrap();
        assert_eq!(run.crawl.max_articles, Some(25));
    }

    #[test]
    fn test_resolve_rejects_zero_max() {
        let overrides = Overrides {
            max_articles: Some(0),
            ..Overrides::default()
        };
        let err = Config::default().resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "max", .. }));
    }

    #[test]
    fn test_resolve_rejects_negative_delay() {
        let config = Config {
            delay_seconds: -1.0,
            ..Config::default()
        };
        let err = config.resolve(&Overrides::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "delay_seconds",
                ..
            }
        ));

        let config = Config {
            delay_seconds: f64::NAN,
            ..Config::default()
        };
        assert!(config.resolve(&Overrides::default()).is_err());
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let overrides = Overrides {
            feed_url: Some("ftp://example.com/feed".to_string()),
            ..Overrides::default()
        };
        let err = Config::default().resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Url(_)));
    }

    #[test]
    fn test_resolve_date_range() {
        let overrides = Overrides {
            from: Some("01/04/2025".to_string()),
            to: Some("2025-04-30".to_string()),
            ..Overrides::default()
        };
        let run = Config::default().resolve(&overrides).unwrap();
        assert_eq!(
            run.date_range.start_date(),
            NaiveDate::from_ymd_opt(2025, 4, 1)
        );
        assert_eq!(
            run.date_range.end_date(),
            NaiveDate::from_ymd_opt(2025, 4, 30)
        );
    }

    #[test]
    fn test_resolve_rejects_inverted_dates() {
        let overrides = Overrides {
            from: Some("30/04/2025".to_string()),
            to: Some("01/04/2025".to_string()),
            ..Overrides::default()
        };
        let err = Config::default().resolve(&overrides).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DateRange(DateRangeError::Inverted { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let config = Config {
            timeout_seconds: 0,
            ..Config::default()
        };
        assert!(config.resolve(&Overrides::default()).is_err());
    }

    #[test]
    fn test_default_path_under_config_dir() {
        if let Some(path) = default_path() {
            assert!(path.ends_with(".config/feedsheet/config.toml"));
        }
    }
}
