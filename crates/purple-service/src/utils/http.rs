use std::time::Duration;

use serde::Deserialize;

/// The `User-Agent` sent with every backend request.
pub const USER_AGENT: &str = concat!("purple/", env!("CARGO_PKG_VERSION"));

/// Timeouts applied to all backend requests.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    /// The timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect: Duration,
    /// Global timeout for one request, including reading the response body.
    #[serde(with = "humantime_serde")]
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(1),
            request: Duration::from_secs(15),
        }
    }
}

/// Creates a [`reqwest::Client`] with the provided timeouts.
///
/// Idle connections are kept around for a short while, since consumers tend to poll the same
/// backend in bursts.
pub fn create_client(timeouts: &Timeouts) -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(USER_AGENT)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}
