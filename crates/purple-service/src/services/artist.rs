use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::backend::BackendClient;
use crate::config::CoordinationConfig;
use crate::coordination::{
    FetchError, FetchResult, RequestCoordinator, RequestKey, RequestOptions,
};
use crate::types::ArtistProfile;

/// Looks up artist profiles by name.
///
/// Results are only kept briefly. This collapses a prefetch, for instance on hover, with the
/// lookup of the navigation that immediately follows it.
#[derive(Debug, Clone)]
pub struct ArtistLookup {
    backend: Arc<BackendClient>,
    coordinator: RequestCoordinator<ArtistProfile>,
    ttl: Duration,
}

impl ArtistLookup {
    pub fn new(backend: Arc<BackendClient>, config: &CoordinationConfig) -> Self {
        Self {
            backend,
            coordinator: RequestCoordinator::new("artists", config.computation_timeout),
            ttl: config.artist_ttl,
        }
    }

    /// Looks up the artist with the given name.
    pub async fn lookup(&self, name: &str) -> FetchResult<ArtistProfile> {
        self.request(name).await
    }

    /// Starts looking up the artist in the background.
    ///
    /// A [`lookup`](Self::lookup) of the same name shortly afterwards joins this request or is
    /// served from its result.
    pub fn prefetch(&self, name: &str) {
        tracing::trace!(artist = name, "Prefetching artist");
        drop(self.request(name));
    }

    fn request(&self, name: &str) -> BoxFuture<'static, FetchResult<ArtistProfile>> {
        let name = name.trim();
        if name.is_empty() {
            return future::ready(Err(FetchError::NotFound)).boxed();
        }

        let mut url = self.backend.endpoint(&["api", "artist"]);
        url.query_pairs_mut().append_pair("name", name);
        let key = RequestKey::request("GET", &url);
        let backend = Arc::clone(&self.backend);

        let producer = move || async move { backend.get_json(url).await };

        self.coordinator
            .dedupe_request(key, producer, RequestOptions::cached(self.ttl))
    }
}
