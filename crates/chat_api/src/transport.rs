use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};

use crate::config::ChatApiConfig;
use crate::error::ChatApiError;
use crate::headers::{build_headers, HEADER_AUTHORIZATION};
use crate::payload::ChatRequest;
use crate::url::normalize_chat_url;

/// Fully read response of one attempt.
///
/// The body is always drained, including for 429/503, so the connection can
/// be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure below the HTTP response level (connect, reset, timeout, decode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Status attached to the failure, when the transport saw one.
    pub status: Option<StatusCode>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status.as_u16()),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self {
            status: error.status(),
            message: error.to_string(),
        }
    }
}

/// One attempt against the completion endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug)]
pub struct HttpTransport {
    http: Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoint = normalize_chat_url(&config.base_url);
        let endpoint = Url::parse(&endpoint)
            .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{endpoint}: {error}")))?;
        let headers = header_map(config)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;

        Ok(Self {
            http,
            endpoint,
            headers,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn build_request(&self, request: &ChatRequest) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(request)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        let response = self.build_request(request).send().await?;
        let status = response.status();

        match response.text().await {
            Ok(body) => Ok(TransportResponse { status, body }),
            Err(error) if status.is_success() => Err(TransportError::from(error)),
            // The status already decides the outcome; the body only feeds the message.
            Err(_) => Ok(TransportResponse {
                status,
                body: String::new(),
            }),
        }
    }
}

fn header_map(config: &ChatApiConfig) -> Result<HeaderMap, ChatApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in build_headers(config)? {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header key: {key}")))?;
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header value for {key}")))?;
        if key == HEADER_AUTHORIZATION {
            value.set_sensitive(true);
        }
        out.insert(name, value);
    }
    Ok(out)
}
