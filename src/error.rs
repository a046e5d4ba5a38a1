// Error types shared across the crate.
// Every failure the migration scenarios can hit maps to one of these
// variants so callers can tell "bad credentials" apart from "workbook
// missing" without string matching.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Sign-in rejected by the server. Carries the server-supplied error
    /// body fields so the message reads `code: summary - detail`.
    #[error("{code}: {summary} - {detail}")]
    Authentication {
        code: String,
        summary: String,
        detail: String,
    },
    /// Any unexpected HTTP status outside of sign-in, carrying the parsed
    /// error body (placeholders substituted for missing pieces).
    #[error("{code}: {summary} - {detail}")]
    ApiCall {
        code: String,
        summary: String,
        detail: String,
    },
    /// A workbook or project lookup came up empty.
    #[error("{0}")]
    NotFound(String),
    /// Source and destination are already identical; nothing to do.
    #[error("{0}")]
    NoOp(String),
    /// The server answered with a success status but the body is missing
    /// a field we need.
    #[error("malformed server response: {0}")]
    MalformedResponse(String),
    /// Download, upload or publish failed partway through.
    #[error("transfer failed: {0}")]
    Transfer(String),
    /// Transport-level failure (connection refused, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Building a request body failed; practically unreachable for the
    /// small descriptors this crate serializes.
    #[error("could not build XML request: {0}")]
    XmlRequest(#[from] quick_xml::DeError),
}

impl ApiError {
    /// Re-tag an API-call failure as an authentication failure, keeping
    /// the server-supplied fields intact. Used by sign-in only.
    pub(crate) fn into_authentication(self) -> ApiError {
        match self {
            ApiError::ApiCall {
                code,
                summary,
                detail,
            } => ApiError::Authentication {
                code,
                summary,
                detail,
            },
            other => other,
        }
    }

    /// Re-tag an API-call failure as a transfer failure. Download and
    /// publish surface every unexpected status this way.
    pub(crate) fn into_transfer(self) -> ApiError {
        match self {
            err @ ApiError::ApiCall { .. } => ApiError::Transfer(err.to_string()),
            other => other,
        }
    }
}
