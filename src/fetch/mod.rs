//! Retrieval of raw GTFS-RT payloads over HTTP or from a captured file.

mod basic;
mod client;
pub mod auth;
#[cfg(test)]
pub(crate) mod stub;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::FetchError;

/// Where the feed payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    File(PathBuf),
}

impl FeedSource {
    /// `http://` and `https://` sources are fetched, everything else is read
    /// from disk.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            FeedSource::Url(source.to_string())
        } else {
            FeedSource::File(PathBuf::from(source))
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Url(url) => f.write_str(url),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Maps a response status to a [`FetchError`] unless it is in the 2xx range.
pub fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status {
            status_code: status.as_u16(),
        })
    }
}

/// Issues a single GET against `url` and returns the body. No retries.
#[tracing::instrument(skip(client))]
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await.map_err(FetchError::Network)?;
    debug!(status = %resp.status(), "Feed response received");
    check_status(resp.status())?;

    resp.bytes().await.map_err(FetchError::Network)
}

/// Loads the payload from whichever [`FeedSource`] is configured.
pub async fn fetch_source<C: HttpClient>(
    client: &C,
    source: &FeedSource,
) -> Result<Bytes, FetchError> {
    match source {
        FeedSource::Url(url) => fetch_bytes(client, url).await,
        FeedSource::File(path) => tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| FetchError::Read {
                path: path.clone(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubClient;
    use std::env;
    use std::fs;
    use std::time::Duration;

    fn client() -> BasicClient {
        BasicClient::with_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_feed_source_parse() {
        assert_eq!(
            FeedSource::parse("https://example.org/rt"),
            FeedSource::Url("https://example.org/rt".to_string())
        );
        assert_eq!(
            FeedSource::parse("captures/feed.pb"),
            FeedSource::File(PathBuf::from("captures/feed.pb"))
        );
        assert_eq!(
            FeedSource::parse("httpdump.pb"),
            FeedSource::File(PathBuf::from("httpdump.pb"))
        );
        assert_eq!(
            FeedSource::parse("http://localhost:8080/rt"),
            FeedSource::Url("http://localhost:8080/rt".to_string())
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(check_status(StatusCode::NO_CONTENT).is_ok());

        let err = check_status(StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(
            err.to_string(),
            "Erreur 404 lors de la récupération des données"
        );

        let err = check_status(StatusCode::SERVICE_UNAVAILABLE).unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fetch_bytes(&client(), "http://").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_success_body_is_returned() {
        let client = StubClient::ok(b"\x0a\x05".to_vec());
        let bytes = fetch_bytes(&client, "https://example.org/rt").await.unwrap();

        assert_eq!(&bytes[..], b"\x0a\x05");
    }

    #[tokio::test]
    async fn test_not_found_response_is_status_error() {
        let client = StubClient::status(404);
        let err = fetch_bytes(&client, "https://example.org/rt")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status_code: 404 }));
        assert_eq!(
            err.to_string(),
            "Erreur 404 lors de la récupération des données"
        );
    }

    #[tokio::test]
    async fn test_url_source_goes_through_client() {
        let client = StubClient::status(503);
        let source = FeedSource::parse("https://example.org/rt");
        let err = fetch_source(&client, &source).await.unwrap_err();

        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let err = fetch_bytes(&client(), "http://127.0.0.1:9/feed.pb")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn test_fetch_from_file() {
        let path = env::temp_dir().join("gtfs_rt_snapshot_fetch_test.pb");
        fs::write(&path, b"\x0a\x05").unwrap();

        let bytes = fetch_source(&client(), &FeedSource::File(path.clone()))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"\x0a\x05");

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let source = FeedSource::File(PathBuf::from("no/such/feed.pb"));
        let err = fetch_source(&client(), &source).await.unwrap_err();
        assert!(matches!(err, FetchError::Read { .. }));
    }
}
