use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::{MakeWriter, fmt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Logging;

/// Returns the default filter directives for the given level.
///
/// Debug and trace output is limited to the purple crates, since the HTTP stack is very chatty
/// at those levels.
pub fn default_env_filter(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => {
            "INFO,\
             hyper=WARN,\
             reqwest=WARN"
        }
        LevelFilter::DEBUG => {
            "INFO,\
             hyper=WARN,\
             purple=DEBUG,\
             purple_service=DEBUG"
        }
        LevelFilter::TRACE => {
            "INFO,\
             hyper=WARN,\
             purple=TRACE,\
             purple_service=TRACE"
        }
    }
}

/// Returns the filter directives to log with.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn env_filter(config: &Logging) -> String {
    env::var("RUST_LOG").unwrap_or_else(|_| default_env_filter(config.level).to_owned())
}

/// Initializes logging as JSON lines written to `make_writer`.
///
/// Events are also forwarded to Sentry, if it is configured.
pub fn init_json_logging<W>(env_filter: &str, make_writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_env_filter(env_filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer)
        .finish()
        .with(sentry::integrations::tracing::layer())
        .init();
}
