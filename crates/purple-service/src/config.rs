use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::utils::http::Timeouts;

/// The backend that is used if none is configured.
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000/";

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: match env::var("STATSD_SERVER") {
                Ok(metrics_statsd) => Some(metrics_statsd),
                Err(_) => None,
            },
            prefix: "purple".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Fine-tuning of request deduplication and caching.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CoordinationConfig {
    /// How long public playlist stats are served from memory.
    #[serde(with = "humantime_serde")]
    pub stats_ttl: Duration,

    /// How long artist profiles are served from memory.
    ///
    /// This mainly collapses a hover prefetch with the navigation that follows it.
    #[serde(with = "humantime_serde")]
    pub artist_ttl: Duration,

    /// The window in which repeated views of the same playlist by the same user are recorded
    /// only once.
    #[serde(with = "humantime_serde")]
    pub view_window: Duration,

    /// Upper bound for a single coordinated computation.
    ///
    /// Computations that take longer settle with a timeout error, so that a stuck request does
    /// not hold up all later callers of the same key. `null` disables the limit.
    #[serde(with = "humantime_serde")]
    pub computation_timeout: Option<Duration>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            stats_ttl: Duration::from_secs(5),
            artist_ttl: Duration::from_secs(10),
            view_window: Duration::from_secs(24 * 3600),
            computation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The base URL of the Purple Music backend.
    pub backend_url: Url,

    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,

    /// Timeouts for requests to the backend.
    pub timeouts: Timeouts,

    /// Fine-tune request deduplication and caching.
    pub coordination: CoordinationConfig,
}

fn default_backend_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).expect("the default backend URL to be valid")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_url: default_backend_url(),
            logging: Logging::default(),
            metrics: Metrics::default(),
            sentry_dsn: None,
            timeouts: Timeouts::default(),
            coordination: CoordinationConfig::default(),
        }
    }
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}
