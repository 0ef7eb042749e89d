use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture};

use crate::backend::BackendClient;
use crate::config::CoordinationConfig;
use crate::coordination::{
    FetchError, FetchResult, RequestCoordinator, RequestKey, RequestOptions,
};
use crate::types::{PlaylistId, PlaylistStats};

/// Polls the public engagement stats of playlists.
///
/// Stats are fetched once per playlist and kept for a few seconds, so that any number of
/// components polling the same playlists cause only one backend request per interval.
#[derive(Debug, Clone)]
pub struct PlaylistStatsService {
    backend: Arc<BackendClient>,
    coordinator: RequestCoordinator<PlaylistStats>,
    ttl: Duration,
}

impl PlaylistStatsService {
    pub fn new(backend: Arc<BackendClient>, config: &CoordinationConfig) -> Self {
        Self {
            backend,
            coordinator: RequestCoordinator::new("playlist_stats", config.computation_timeout),
            ttl: config.stats_ttl,
        }
    }

    /// Fetches the stats of all given playlists concurrently.
    ///
    /// Duplicate ids are fetched once. Playlists whose stats the backend refuses to share
    /// (`401`) count as having zero stats. Playlists that fail otherwise are missing from the
    /// result.
    pub async fn fetch_stats<'a, I>(&self, ids: I) -> BTreeMap<PlaylistId, PlaylistStats>
    where
        I: IntoIterator<Item = &'a PlaylistId>,
    {
        let ids: BTreeSet<&PlaylistId> = ids.into_iter().collect();
        let requests = ids.into_iter().map(|id| {
            let request = self.fetch_one(id);
            async move { (id, request.await) }
        });

        let mut stats = BTreeMap::new();
        for (id, result) in future::join_all(requests).await {
            match result {
                Ok(value) => {
                    stats.insert(id.clone(), value);
                }
                Err(err) => {
                    tracing::warn!(playlist = %id, error = %err, "Failed to fetch playlist stats");
                }
            }
        }
        stats
    }

    /// Fetches the stats of a single playlist.
    pub fn fetch_one(&self, id: &PlaylistId) -> BoxFuture<'static, FetchResult<PlaylistStats>> {
        let url = self
            .backend
            .endpoint(&["api", "playlists", id.as_str(), "public-stats"]);
        let key = RequestKey::request("GET", &url);
        let backend = Arc::clone(&self.backend);

        let producer = move || async move {
            match backend.get_json(url).await {
                Err(FetchError::Unauthorized(_)) => Ok(PlaylistStats::default()),
                result => result,
            }
        };

        self.coordinator
            .dedupe_request(key, producer, RequestOptions::cached(self.ttl))
    }
}
