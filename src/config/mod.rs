//! Configuration management for the vertretung crawler
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. A configuration is built once at startup; every
//! worker receives its own [`InstitutionConfig`] by value.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parser::Locale;

/// Upper bound for `stale_after_hours`, one leap year
pub const MAX_STALE_AFTER_HOURS: u64 = 24 * 366;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker loop configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Crawled institutions
    #[serde(default)]
    pub institutions: Vec<InstitutionConfig>,
}

/// Worker loop and HTTP settings shared by all institutions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval_secs: u64,

    /// Upper bound of the random delay before the first cycle
    pub startup_jitter_secs: u64,

    /// Number of calendar days fetched per cycle, starting today
    pub window_days: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Probe each date with HEAD before the GET
    pub probe_with_head: bool,

    /// Age after which a 304 response is no longer trusted
    pub stale_after_hours: u64,

    /// User agent string
    pub user_agent: String,

    /// Write normalized batches as JSON into this directory
    pub export_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// One school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionConfig {
    /// Stable identifier, used in logs and export file names
    pub id: String,

    /// Display name
    pub title: String,

    /// IANA timezone of the plan timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Language of the plan dates
    #[serde(default)]
    pub locale: Locale,

    /// Unprefixed single-tenant naming
    #[serde(default)]
    pub legacy: bool,

    /// Student feed
    pub student: FeedConfig,

    /// Optional teacher feed
    #[serde(default)]
    pub teacher: Option<FeedConfig>,
}

/// Upstream source of one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the data directory, ending in `/`
    pub url: String,

    /// Basic auth user
    pub username: String,

    /// Basic auth password
    pub password: String,

    /// Password clients must present to see the content
    #[serde(default)]
    pub requested_password: Option<String>,

    /// Build course selection; defaults to true for students and false for teachers
    #[serde(default)]
    pub with_courses: Option<bool>,

    /// File name prefix of dated plans
    #[serde(default)]
    pub plan_prefix: Option<String>,

    /// Whole-roster file used when no dated plan exists
    #[serde(default)]
    pub fallback_file: Option<String>,
}

/// Which tenant a feed serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRole {
    Student,
    Teacher,
}

impl FeedConfig {
    pub fn with_courses(&self, role: FeedRole) -> bool {
        self.with_courses.unwrap_or(role == FeedRole::Student)
    }

    pub fn plan_prefix(&self, role: FeedRole) -> &str {
        match (&self.plan_prefix, role) {
            (Some(prefix), _) => prefix,
            (None, FeedRole::Student) => "PlanKl",
            (None, FeedRole::Teacher) => "PlanLe",
        }
    }

    pub fn fallback_file(&self, role: FeedRole) -> &str {
        match (&self.fallback_file, role) {
            (Some(file), _) => file,
            (None, FeedRole::Student) => "Klassen.xml",
            (None, FeedRole::Teacher) => "Lehrer.xml",
        }
    }
}

impl InstitutionConfig {
    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("institution {}: unknown timezone {}: {e}", self.id, self.timezone))
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("institution id must not be empty");
        }

        self.tz()?;

        validate_feed(&self.id, "student", &self.student)?;
        if let Some(teacher) = &self.teacher {
            if self.legacy {
                anyhow::bail!("institution {}: legacy mode does not support a teacher feed", self.id);
            }
            validate_feed(&self.id, "teacher", teacher)?;
        }

        Ok(())
    }
}

fn validate_feed(id: &str, role: &str, feed: &FeedConfig) -> Result<()> {
    let parsed = url::Url::parse(&feed.url)
        .with_context(|| format!("institution {id}: invalid {role} url {}", feed.url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("institution {id}: {role} url must use http or https");
    }
    if !feed.url.ends_with('/') {
        anyhow::bail!("institution {id}: {role} url must end with '/'");
    }

    Ok(())
}

fn default_timezone() -> String {
    String::from("Europe/Berlin")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            startup_jitter_secs: 10,
            window_days: 7,
            request_timeout_secs: 600,
            probe_with_head: false,
            stale_after_hours: 24,
            user_agent: format!("vertretung/{}", env!("CARGO_PKG_VERSION")),
            export_dir: None,
        }
    }
}

impl WorkerConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LoggingConfig {
    /// Filter directive for the subscriber; `verbose` forces debug output
    /// for this crate
    #[must_use]
    pub fn filter_directive(&self, verbose: bool) -> String {
        let level = if verbose { "debug" } else { self.level.as_str() };
        format!("vertretung={level},warn")
    }

    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.level.as_str()) {
            anyhow::bail!("unknown log level: {}", self.level);
        }
        if !LOG_FORMATS.contains(&self.format.as_str()) {
            anyhow::bail!("unknown log format: {}", self.format);
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Worker and logging settings come from `VERTRETUNG_*`. A single
    /// institution is assembled from `VERTRETUNG_INSTITUTION_*` when
    /// `VERTRETUNG_INSTITUTION_ID` is set.
    pub fn from_env() -> Result<Self> {
        let defaults = WorkerConfig::default();

        let worker = WorkerConfig {
            interval_secs: env_parse("VERTRETUNG_INTERVAL_SECS")?.unwrap_or(defaults.interval_secs),
            startup_jitter_secs: env_parse("VERTRETUNG_STARTUP_JITTER_SECS")?
                .unwrap_or(defaults.startup_jitter_secs),
            window_days: env_parse("VERTRETUNG_WINDOW_DAYS")?.unwrap_or(defaults.window_days),
            request_timeout_secs: env_parse("VERTRETUNG_REQUEST_TIMEOUT")?
                .unwrap_or(defaults.request_timeout_secs),
            probe_with_head: env_parse("VERTRETUNG_PROBE_WITH_HEAD")?
                .unwrap_or(defaults.probe_with_head),
            stale_after_hours: env_parse("VERTRETUNG_STALE_AFTER_HOURS")?
                .unwrap_or(defaults.stale_after_hours),
            user_agent: std::env::var("VERTRETUNG_USER_AGENT").unwrap_or(defaults.user_agent),
            export_dir: std::env::var("VERTRETUNG_EXPORT_DIR").ok().map(PathBuf::from),
        };

        let logging = LoggingConfig {
            level: std::env::var("VERTRETUNG_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("VERTRETUNG_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
        };

        let mut institutions = Vec::new();
        if let Ok(id) = std::env::var("VERTRETUNG_INSTITUTION_ID") {
            institutions.push(institution_from_env(id)?);
        }

        Ok(Self {
            worker,
            logging,
            institutions,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.worker.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }

        if self.worker.window_days == 0 {
            anyhow::bail!("window_days must be greater than 0");
        }

        if self.worker.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.worker.stale_after_hours > MAX_STALE_AFTER_HOURS {
            anyhow::bail!(
                "stale_after_hours must be at most {MAX_STALE_AFTER_HOURS}, got {}",
                self.worker.stale_after_hours
            );
        }

        self.logging.validate()?;

        let mut ids = HashSet::new();
        for institution in &self.institutions {
            institution.validate()?;
            if !ids.insert(institution.id.as_str()) {
                anyhow::bail!("duplicate institution id: {}", institution.id);
            }
        }

        Ok(())
    }
}

fn institution_from_env(id: String) -> Result<InstitutionConfig> {
    let required = |name: &str| {
        std::env::var(name).with_context(|| format!("{name} is required when VERTRETUNG_INSTITUTION_ID is set"))
    };

    let student = FeedConfig {
        url: required("VERTRETUNG_INSTITUTION_URL")?,
        username: std::env::var("VERTRETUNG_INSTITUTION_USERNAME")
            .unwrap_or_else(|_| String::from("schueler")),
        password: required("VERTRETUNG_INSTITUTION_PASSWORD")?,
        requested_password: std::env::var("VERTRETUNG_INSTITUTION_REQUESTED_PASSWORD").ok(),
        with_courses: None,
        plan_prefix: None,
        fallback_file: None,
    };

    let teacher = match std::env::var("VERTRETUNG_INSTITUTION_TEACHER_URL") {
        Ok(url) => Some(FeedConfig {
            url,
            username: std::env::var("VERTRETUNG_INSTITUTION_TEACHER_USERNAME")
                .unwrap_or_else(|_| String::from("lehrer")),
            password: required("VERTRETUNG_INSTITUTION_TEACHER_PASSWORD")?,
            requested_password: std::env::var("VERTRETUNG_INSTITUTION_TEACHER_REQUESTED_PASSWORD")
                .ok(),
            with_courses: None,
            plan_prefix: None,
            fallback_file: None,
        }),
        Err(_) => None,
    };

    let locale = match std::env::var("VERTRETUNG_INSTITUTION_LOCALE") {
        Ok(value) => value.parse::<Locale>().map_err(anyhow::Error::msg)?,
        Err(_) => Locale::default(),
    };

    Ok(InstitutionConfig {
        title: std::env::var("VERTRETUNG_INSTITUTION_TITLE").unwrap_or_else(|_| id.clone()),
        id,
        timezone: std::env::var("VERTRETUNG_INSTITUTION_TIMEZONE")
            .unwrap_or_else(|_| default_timezone()),
        locale,
        legacy: env_parse("VERTRETUNG_INSTITUTION_LEGACY")?.unwrap_or(false),
        student,
        teacher,
    })
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        Err(_) => Ok(None),
    }
}
