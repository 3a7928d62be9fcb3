use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::request::HttpError;

/// Longest slice of a raw body that will be echoed back in an error message
const MAX_ERROR_BODY: usize = 200;

#[derive(Error, Debug)]
pub enum TenorError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Could not reach tenor: {0}")]
    Network(String),
    #[error("Tenor responded with {status}: {message}")]
    RemoteService { status: StatusCode, message: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

// v2 wraps errors the way every google api does, v1 used a bare string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TenorErrorBody {
    Google { error: GoogleErrorDetail },
    Legacy { error: String },
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<TenorErrorBody>(body) {
        Ok(TenorErrorBody::Google { error }) => error.message,
        Ok(TenorErrorBody::Legacy { error }) => error,
        Err(_) if body.trim().is_empty() => "no response body".to_owned(),
        Err(_) => body.trim().chars().take(MAX_ERROR_BODY).collect(),
    }
}

impl From<HttpError> for TenorError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::FailStatus(ctx) => TenorError::RemoteService {
                status: ctx.code,
                message: error_message(&ctx.body),
            },
            HttpError::UnexpectedBody(ctx) => TenorError::RemoteService {
                status: ctx.code,
                message: "response body did not have the expected shape".to_owned(),
            },
            HttpError::Network(reason) => TenorError::Network(reason),
        }
    }
}
