use async_trait::async_trait;
use reqwest::{Request, Response};

use super::client::HttpClient;

/// Canned [`HttpClient`] for tests: answers every request the same way.
pub(crate) enum StubClient {
    Respond { status: u16, body: Vec<u8> },
    /// Never answers, like a server that accepted the connection and stalled.
    Hang,
}

impl StubClient {
    pub(crate) fn ok(body: Vec<u8>) -> Self {
        StubClient::Respond { status: 200, body }
    }

    pub(crate) fn status(status: u16) -> Self {
        StubClient::Respond {
            status,
            body: b"not found".to_vec(),
        }
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn execute(&self, _req: Request) -> reqwest::Result<Response> {
        match self {
            StubClient::Respond { status, body } => {
                let resp = http::Response::builder()
                    .status(*status)
                    .body(body.clone())
                    .expect("stub response is well-formed");
                Ok(Response::from(resp))
            }
            StubClient::Hang => std::future::pending().await,
        }
    }
}
