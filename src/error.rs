use thiserror::Error;

use crate::normalize::Params;
use crate::validator::ValidationError;

/// Number of body characters kept when a response is reported as an error.
pub const PREVIEW_LENGTH: usize = 80;

/// Everything that can go wrong in the JsonApi protocol core.
///
/// Wire problems (bad JSON, missing or mismatched status) never show up here
/// directly: the classifier turns those into `ClassifiedResponse::Error`, and
/// they only become a `JsonApiError::Response` when the caller asks for it.
#[derive(Debug, Error)]
pub enum JsonApiError {
    /// Invalid signer or server setup (empty key, unknown digest algorithm, bad settings).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Verification was requested but a signature field is absent.
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The caller asked for something that makes no sense for the value at hand.
    #[error("logic error: {0}")]
    Logic(String),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server error: {0}")]
    Server(String),
}

impl From<config::ConfigError> for JsonApiError {
    fn from(error: config::ConfigError) -> Self {
        JsonApiError::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for JsonApiError {
    fn from(error: serde_json::Error) -> Self {
        JsonApiError::InvalidArgument(error.to_string())
    }
}

/// A Failure or Error response projected into an error value.
///
/// Carries enough of the original exchange (status, URI and a bounded preview
/// of the body) to be logged on its own.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("[{status}] API Server returned error:  {message} from {uri} (\"{preview}\")")]
pub struct ResponseError {
    message: String,
    status: u16,
    uri: String,
    preview: String,
    errors: Params,
}

impl ResponseError {
    pub fn new(
        message: impl Into<String>,
        status: u16,
        uri: impl Into<String>,
        body: &str,
        errors: Params,
    ) -> ResponseError {
        ResponseError {
            message: message.into(),
            status,
            uri: uri.into(),
            preview: crate::util::truncate(body, PREVIEW_LENGTH),
            errors,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raw HTTP status of the response.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Per-parameter error messages; empty unless projected from a Failure.
    pub fn errors(&self) -> &Params {
        &self.errors
    }
}
