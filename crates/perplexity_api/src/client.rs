use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::cancel::{await_or_cancel, CancellationSignal};
use crate::config::PerplexityApiConfig;
use crate::error::{parse_error_message, PerplexityApiError};
use crate::headers::build_headers;
use crate::payload::ChatCompletionRequest;
use crate::sse::EventStreamReader;
use crate::url::normalize_completions_url;

/// Frame reader over a live completion response body.
pub type ResponseFrames = EventStreamReader<BoxStream<'static, Result<Vec<u8>, reqwest::Error>>>;

#[derive(Debug)]
pub struct PerplexityClient {
    http: Client,
    config: PerplexityApiConfig,
}

impl PerplexityClient {
    pub fn new(config: PerplexityApiConfig) -> Result<Self, PerplexityApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(PerplexityApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_completions_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, PerplexityApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    PerplexityApiError::InvalidHeader(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    PerplexityApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::RequestBuilder, PerplexityApiError> {
        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Sends the request once. Non-success statuses become
    /// [`PerplexityApiError::Status`] with the server's message.
    pub async fn send(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, PerplexityApiError> {
        let pending = self.build_request(request)?.send();
        let response = await_or_cancel(pending, cancellation).await??;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(%status, "completion stream opened");
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(PerplexityApiError::Status(
            status,
            parse_error_message(status, &body),
        ))
    }

    pub async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ResponseFrames, PerplexityApiError> {
        let response = self.send(request, cancellation).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(EventStreamReader::new(body))
    }
}
