//! `reqwest`-backed transport

use super::{DocumentRequest, RawResponse, ResponseType, Transport};
use crate::config::FetchConfig;
use crate::error::{Error, Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE, HeaderName, HeaderValue, PRAGMA};
use tracing::debug;

/// Transport using a shared `reqwest::Client`
///
/// The client enforces the configured connect and request timeouts; both
/// surface as [`TransportError::Timeout`] or [`TransportError::Connect`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    accept: String,
    require_success_status: bool,
    max_body_bytes: Option<u64>,
}

impl ReqwestTransport {
    /// Build a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client cannot
    /// be created.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    /// Wrap an existing client, taking the remaining settings from `config`
    pub fn with_client(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self {
            client,
            accept: config.accept.clone(),
            require_success_status: config.require_success_status,
            max_body_bytes: config.max_body_bytes,
        }
    }

    fn build(&self, request: &DocumentRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(request.url.clone());

        if request.response_type == ResponseType::Document {
            builder = builder.header(ACCEPT, self.accept.as_str());
        }
        if request.bypass_cache {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }
        if let Some(credential) = request.effective_credential() {
            if let Some(cookies) = credential.cookie_header() {
                builder = builder.header(COOKIE, cookies);
            }
            for (name, value) in &credential.headers {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => builder = builder.header(name, value),
                    _ => debug!(header = %name, "Skipping credential header that is not valid HTTP"),
                }
            }
        }
        builder
    }

    fn check_length(&self, length: u64) -> std::result::Result<(), TransportError> {
        match self.max_body_bytes {
            Some(limit) if length > limit => Err(TransportError::BodyTooLarge { limit }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        request: &DocumentRequest,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut response = self.build(request).send().await?;

        let status = response.status();
        if self.require_success_status && !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        if let Some(length) = response.content_length() {
            self.check_length(length)?;
        }

        let url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Stream the body so an oversized response without Content-Length is cut off early
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            self.check_length(body.len() as u64)?;
        }

        debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            "Response received"
        );

        Ok(RawResponse {
            url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}
