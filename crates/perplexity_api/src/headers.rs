use std::collections::BTreeMap;

use crate::config::PerplexityApiConfig;
use crate::error::PerplexityApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for streaming completion requests.
pub fn build_headers(
    config: &PerplexityApiConfig,
) -> Result<BTreeMap<String, String>, PerplexityApiError> {
    let token = config.api_token.trim();
    if token.is_empty() {
        return Err(PerplexityApiError::MissingApiToken);
    }

    let mut headers = BTreeMap::new();
    headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    headers.insert(HEADER_USER_AGENT.to_owned(), default_user_agent());

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn default_user_agent() -> String {
    format!(
        "plexctl/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
