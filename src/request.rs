use std::sync::Arc;

use async_trait::async_trait;
use log::error;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ResponseErrorContext {
    pub body: String,
    pub code: StatusCode,
}

/// Wrapper for providing actual useful information about
/// why responses failed since reqwest throws the body away
/// when it encounters errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Failed response code {}", .0.code)]
    FailStatus(ResponseErrorContext),
    #[error("Unexpected body with response code {}", .0.code)]
    UnexpectedBody(ResponseErrorContext),
    #[error("Request error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Network(err.to_string())
    }
}

/// A fully buffered response. Transports hand back the raw status and body
/// and leave interpretation to [`parse_successful_response`]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Anything that can turn a url into a single GET response.
/// Timeouts and retries belong in implementations of this trait, not in
/// the code that maps responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError>;
}

pub struct ReqwestTransport {
    pub client: Arc<Client>,
}

impl ReqwestTransport {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .get(url.clone())
            .headers(request_default_headers())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

pub fn parse_successful_response<T: DeserializeOwned>(
    url: &Url,
    response: HttpResponse,
) -> Result<T, HttpError> {
    let HttpResponse { status, body } = response;
    if !status.is_success() {
        return Err(HttpError::FailStatus(ResponseErrorContext { body, code: status }));
    }
    serde_json::from_str::<T>(&body).map_err(|err| {
        // the query string carries the api key, only log the path
        error!("Failed to parse response from {}: {}", url.path(), err);
        HttpError::UnexpectedBody(ResponseErrorContext { body, code: status })
    })
}

pub fn request_default_headers() -> HeaderMap {
    HeaderMap::from_iter([(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_static(USER_AGENT),
    )])
}
