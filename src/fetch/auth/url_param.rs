use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends the feed API key as a query
/// parameter, for producers that take `?apiKey=...` style credentials.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    fn apply(&self, req: &mut reqwest::Request) {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.apply(&mut req);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_appended_to_existing_query() {
        let auth = UrlParam {
            inner: (),
            param_name: "apikey".to_string(),
            key: "a b".to_string(),
        };
        let url = reqwest::Url::parse("https://example.org/rt?format=pb").unwrap();
        let mut req = reqwest::Request::new(reqwest::Method::GET, url);

        auth.apply(&mut req);

        assert_eq!(req.url().as_str(), "https://example.org/rt?format=pb&apikey=a+b");
    }
}
