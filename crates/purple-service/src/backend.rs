//! Access to the Purple Music backend over HTTP.

use std::time::Instant;

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::coordination::{FetchError, FetchResult};
use crate::utils::http::{Timeouts, create_client};

/// A thin JSON client for the backend API.
///
/// All paths are resolved relative to the configured base URL, so the backend may be mounted
/// below a path prefix.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    timeouts: Timeouts,
}

impl BackendClient {
    pub fn new(mut base_url: Url, timeouts: Timeouts) -> anyhow::Result<Self> {
        if base_url.cannot_be_a_base() {
            anyhow::bail!("backend URL `{base_url}` cannot be used as a base");
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = create_client(&timeouts)?;
        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    /// Returns the URL for the endpoint with the given path segments.
    ///
    /// Segments are percent-encoded, so ids may contain arbitrary characters.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetches and deserializes the JSON document at `url`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        let response = self.execute("GET", self.client.get(url)).await?;
        response
            .json()
            .await
            .map_err(|err| FetchError::from_reqwest(err, self.timeouts.request))
    }

    /// Sends `body` as JSON to `url`, ignoring the response body.
    pub async fn post_json<B>(&self, url: Url, body: &B) -> FetchResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute("POST", self.client.post(url).json(body))
            .await
            .map(drop)
    }

    async fn execute(
        &self,
        method: &'static str,
        builder: RequestBuilder,
    ) -> FetchResult<Response> {
        let request = builder
            .build()
            .map_err(|err| FetchError::from_reqwest(err, self.timeouts.request))?;
        let url = request.url().clone();

        tracing::debug!("Requesting `{method} {url}`");
        let start = Instant::now();
        let result = self.client.execute(request).await;

        let status = match &result {
            Ok(response) if response.status().is_success() => "ok",
            Ok(_) => "status",
            Err(_) => "err",
        };
        metric!(
            timer("backend.request.duration") = start.elapsed(),
            "method" => method,
            "status" => status,
        );

        let response = result.map_err(|err| {
            tracing::debug!(error = &err as &dyn std::error::Error, "Request to `{url}` failed");
            FetchError::from_reqwest(err, self.timeouts.request)
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::trace!("Success hitting `{url}`");
            Ok(response)
        } else {
            tracing::debug!("Unexpected status code from `{url}`: {status}");
            Err(FetchError::from_status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base.parse().unwrap(), Timeouts::default()).unwrap()
    }

    #[test]
    fn test_endpoint() {
        let backend = client("http://localhost:3000/");
        let url = backend.endpoint(&["api", "playlists", "p1", "public-stats"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/playlists/p1/public-stats"
        );
    }

    #[test]
    fn test_endpoint_with_prefix() {
        let backend = client("https://purplemusic.app/backend");
        let url = backend.endpoint(&["api", "artist"]);
        assert_eq!(url.as_str(), "https://purplemusic.app/backend/api/artist");
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let backend = client("http://localhost:3000/");
        let url = backend.endpoint(&["api", "playlists", "a/b c", "public-stats"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/playlists/a%2Fb%20c/public-stats"
        );
    }

    #[test]
    fn test_invalid_base() {
        let base = "mailto:dev@purplemusic.app".parse().unwrap();
        let result = BackendClient::new(base, Timeouts::default());
        assert!(result.is_err());
    }
}
