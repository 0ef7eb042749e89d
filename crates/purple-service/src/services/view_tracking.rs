use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendClient;
use crate::config::CoordinationConfig;
use crate::coordination::{FetchResult, RequestCoordinator, RequestKey};
use crate::types::{PlaylistId, TrackViewRequest, UserId, ViewOutcome};

/// Records playlist views.
///
/// A view of a playlist by a user is sent at most once per configured window, no matter how
/// often the playlist page is mounted or re-rendered in between.
#[derive(Debug, Clone)]
pub struct ViewTracker {
    backend: Arc<BackendClient>,
    coordinator: RequestCoordinator<()>,
    window: Duration,
}

impl ViewTracker {
    pub fn new(backend: Arc<BackendClient>, config: &CoordinationConfig) -> Self {
        Self {
            backend,
            coordinator: RequestCoordinator::new("playlist_views", config.computation_timeout),
            window: config.view_window,
        }
    }

    /// Records that `user_id` viewed `playlist_id`.
    ///
    /// Returns [`ViewOutcome::Skipped`] if the view was already recorded within the window. A
    /// failed attempt still counts as recorded for the purpose of the window, and is not retried
    /// until the window has passed.
    pub async fn track_view(
        &self,
        user_id: &UserId,
        playlist_id: &PlaylistId,
    ) -> FetchResult<ViewOutcome> {
        let key = RequestKey::event("playlist-view", [user_id.as_str(), playlist_id.as_str()]);
        let url = self.backend.endpoint(&["api", "playlist-views", "track"]);
        let body = TrackViewRequest {
            user_id: user_id.clone(),
            playlist_id: playlist_id.clone(),
        };
        let backend = Arc::clone(&self.backend);

        let producer = move || async move { backend.post_json(url, &body).await };

        match self.coordinator.dedupe_event(key, self.window, producer) {
            Some(tracked) => tracked.await.map(|()| ViewOutcome::Recorded),
            None => {
                tracing::trace!(user = %user_id, playlist = %playlist_id, "Skipping duplicate view");
                Ok(ViewOutcome::Skipped)
            }
        }
    }
}
