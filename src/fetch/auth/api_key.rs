use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// Header name or value rejected by [`ApiKey::new`].
#[derive(Debug, thiserror::Error)]
#[error("en-tête d'authentification invalide: {0}")]
pub struct InvalidHeader(String);

/// An [`HttpClient`] wrapper that sends the feed API key as an HTTP header.
///
/// Name and value are validated once, when the wrapper is built.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self, InvalidHeader> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| InvalidHeader(format!("{header_name}: {e}")))?;
        let mut value =
            HeaderValue::from_str(key).map_err(|e| InvalidHeader(format!("{header_name}: {e}")))?;
        value.set_sensitive(true);

        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// Uses `Authorization: Bearer <key>`.
    pub fn bearer(inner: C, key: &str) -> Result<Self, InvalidHeader> {
        Self::new(inner, "Authorization", &format!("Bearer {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
