//! Client wrappers that attach a feed API key to every request.

mod api_key;
mod url_param;

pub use api_key::{ApiKey, InvalidHeader};
pub use url_param::UrlParam;
