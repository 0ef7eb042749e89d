//! Provides the backend consumers and a way to initialize them.
//!
//! Each consumer owns its own [`RequestCoordinator`](crate::coordination::RequestCoordinator),
//! so cached values and in-flight requests are never shared between unrelated consumers.
//! [`SharedServices`] initializes all of them according to the provided [`Config`].

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backend::BackendClient;
use crate::config::Config;

mod artist;
mod playlist_stats;
mod view_tracking;

pub use artist::ArtistLookup;
pub use playlist_stats::PlaylistStatsService;
pub use view_tracking::ViewTracker;

#[derive(Debug)]
pub struct SharedServices {
    pub config: Config,
    pub backend: Arc<BackendClient>,
    pub playlist_stats: PlaylistStatsService,
    pub views: ViewTracker,
    pub artists: ArtistLookup,
}

impl SharedServices {
    pub fn new(config: Config) -> Result<Self> {
        let backend = BackendClient::new(config.backend_url.clone(), config.timeouts)
            .context("failed to create backend client")?;
        let backend = Arc::new(backend);

        let coordination = &config.coordination;
        let playlist_stats = PlaylistStatsService::new(Arc::clone(&backend), coordination);
        let views = ViewTracker::new(Arc::clone(&backend), coordination);
        let artists = ArtistLookup::new(Arc::clone(&backend), coordination);

        Ok(Self {
            config,
            backend,
            playlist_stats,
            views,
            artists,
        })
    }
}
