//! Exposes the command line application.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use purple_service::config::Config;
use purple_service::metrics;
use purple_service::services::SharedServices;
use purple_service::types::{PlaylistId, UserId};
use serde_json::{Value, json};

use crate::logging;

/// Purple commands.
#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Fetch the public stats of playlists.
    Stats {
        /// The playlists to fetch stats for.
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },

    /// Record that a user viewed a playlist.
    TrackView {
        /// The user who viewed the playlist.
        #[arg(long)]
        user: String,

        /// The playlist that was viewed.
        #[arg(long)]
        playlist: String,
    },

    /// Look up artists by name.
    ///
    /// All artists are prefetched concurrently before they are looked up one by one.
    Artist {
        /// The names of the artists.
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
}

/// A command line client for the Purple Music backend.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, bin_name = "purple")]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        session_mode: sentry::SessionMode::Request,
        auto_session_tracking: false,
        ..Default::default()
    });

    // SAFETY: We are still single-threaded at this point.
    unsafe { logging::init_logging(&config) };
    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create the tokio runtime")?;

    let output = runtime.block_on(run(cli.command, config))?;
    let output = serde_json::to_string_pretty(&output)?;
    println!("{output}");

    Ok(())
}

async fn run(command: Command, config: Config) -> Result<Value> {
    let services = SharedServices::new(config).context("failed to create services")?;

    let output = match command {
        Command::Stats { ids } => {
            let ids: Vec<PlaylistId> = ids.into_iter().map(PlaylistId::new).collect();
            let stats = services.playlist_stats.fetch_stats(&ids).await;
            serde_json::to_value(stats)?
        }
        Command::TrackView { user, playlist } => {
            let outcome = services
                .views
                .track_view(&UserId::new(user), &PlaylistId::new(playlist))
                .await
                .context("failed to track the playlist view")?;
            json!({ "outcome": outcome })
        }
        Command::Artist { names } => {
            for name in &names {
                services.artists.prefetch(name);
            }

            let mut artists = BTreeMap::new();
            for name in names {
                let artist = match services.artists.lookup(&name).await {
                    Ok(artist) => serde_json::to_value(artist)?,
                    Err(err) => json!({ "error": err.to_string() }),
                };
                artists.insert(name, artist);
            }
            serde_json::to_value(artists)?
        }
    };

    Ok(output)
}
