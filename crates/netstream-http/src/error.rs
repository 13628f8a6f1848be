use netstream::BackendError;
use thiserror::Error;

/// Errors produced by the HTTP backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid header line: {0}")]
    InvalidHeader(String),
    #[error("failed to load CA file {path}: {reason}")]
    CaFile { path: String, reason: String },
    #[error("failed to start runtime: {0}")]
    Runtime(String),
}

impl HttpError {
    pub fn http_status(status: u16, url: String) -> Self {
        Self::HttpStatus { status, url }
    }

    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Gets the HTTP status code if this is an HTTP status error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

impl From<HttpError> for BackendError {
    fn from(error: HttpError) -> Self {
        BackendError::Io(error.to_string())
    }
}

pub type HttpResult<T> = Result<T, HttpError>;
