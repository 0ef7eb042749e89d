//! Helpers for testing the backend consumers.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`MockBackend`], make sure that it is held until all requests to the backend
//!    have been made. If it is dropped, the server stops and all connections to it fail. To avoid
//!    this, assign it to a variable: `let backend = MockBackend::new();`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{self, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;
use url::Url;

/// How long the mock backend takes to answer for ids starting with `slow`.
pub const SLOW_RESPONSE: Duration = Duration::from_millis(100);

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `purple_service` crate and mutes
///    all other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("purple_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
}

impl Server {
    pub fn with_router(router: Router) -> Self {
        let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
struct MockState {
    hits: Mutex<BTreeMap<String, usize>>,
    views: Mutex<Vec<Value>>,
}

/// A stand-in for the Purple Music backend that counts every request it receives.
///
/// The responses depend on the requested ids:
///
///  - `unauthorized` responds with `401`, `forbidden` with `403`, `missing` with `404` and
///    `broken` with `500`.
///  - Ids starting with `slow` are answered after [`SLOW_RESPONSE`].
///  - Any other playlist has `len(id)` likes and ten times as many views.
///
/// Hits are keyed by path and query, for instance `/api/artist?name=Bajaga`.
#[derive(Debug)]
pub struct MockBackend {
    server: Server,
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        let state = Arc::new(MockState::default());

        let hitcounter = {
            let state = state.clone();
            move |extract::OriginalUri(uri), req: extract::Request, next: middleware::Next| {
                let state = state.clone();
                async move {
                    {
                        let mut hits = state.hits.lock().unwrap();
                        let hits = hits.entry(uri.to_string()).or_default();
                        *hits += 1;
                    }

                    next.run(req).await
                }
            }
        };

        let router = Router::new()
            .route("/api/playlists/:id/public-stats", get(playlist_stats))
            .route("/api/playlist-views/track", post(track_view))
            .route("/api/artist", get(artist))
            .with_state(state.clone())
            .layer(middleware::from_fn(hitcounter));

        let server = Server::with_router(router);

        Self { server, state }
    }

    /// Returns the total number of requests received and resets all counters.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.state.hits.lock().unwrap());
        map.into_values().sum()
    }

    /// Returns the number of requests received for `path` without resetting the counters.
    pub fn hits(&self, path: &str) -> usize {
        let hits = self.state.hits.lock().unwrap();
        hits.get(path).copied().unwrap_or_default()
    }

    /// Returns the requests received per path and resets all counters.
    pub fn all_hits(&self) -> Vec<(String, usize)> {
        let map = std::mem::take(&mut *self.state.hits.lock().unwrap());
        map.into_iter().collect()
    }

    /// Returns the bodies of all view tracking requests received so far.
    pub fn recorded_views(&self) -> Vec<Value> {
        self.state.views.lock().unwrap().clone()
    }

    /// Returns the URL to configure as the backend base URL.
    pub fn base_url(&self) -> Url {
        self.server.url("/")
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn failure(id: &str) -> Option<StatusCode> {
    match id {
        "unauthorized" => Some(StatusCode::UNAUTHORIZED),
        "forbidden" => Some(StatusCode::FORBIDDEN),
        "missing" => Some(StatusCode::NOT_FOUND),
        "broken" => Some(StatusCode::INTERNAL_SERVER_ERROR),
        _ => None,
    }
}

async fn delay(id: &str) {
    if id.starts_with("slow") {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }
}

async fn playlist_stats(Path(id): Path<String>) -> Response {
    delay(&id).await;
    if let Some(status) = failure(&id) {
        return status.into_response();
    }

    let likes = id.len();
    Json(json!({ "likes": likes, "views": likes * 10 })).into_response()
}

async fn track_view(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let playlist = body["playlist_id"].as_str().unwrap_or_default().to_owned();
    delay(&playlist).await;
    state.views.lock().unwrap().push(body);

    match failure(&playlist) {
        Some(status) => status.into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn artist(Query(query): Query<BTreeMap<String, String>>) -> Response {
    let name = query.get("name").cloned().unwrap_or_default();
    delay(&name).await;
    if let Some(status) = failure(&name) {
        return status.into_response();
    }

    Json(json!({
        "id": format!("artist-{}", name.to_lowercase()),
        "name": name,
        "channelId": format!("UC-{}", name.to_lowercase()),
    }))
    .into_response()
}
