//!
//! The JSON envelope every JsonApi response is wrapped in.
//!
//! ```text
//! 200  {"status":"ok","detail":{...}}
//! 400  {"status":"fail","detail":{"errors":{"param":"message"}}}
//! ```
//!
use serde_json::Value;
use warp::http::StatusCode;
use warp::Reply;

use crate::normalize::Params;

pub const KEY_STATUS: &str = "status";
pub const KEY_DETAIL: &str = "detail";
pub const KEY_ERRORS: &str = "errors";

pub const STATUS_OK: &str = "ok";
pub const STATUS_FAIL: &str = "fail";

pub const HTTP_OK: u16 = 200;
pub const HTTP_BAD_REQUEST: u16 = 400;

pub const ERR_ARRAY_INVALID: &str = "Array value not allowed.";

/// A response body together with the HTTP status it must be sent with.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    http_status: u16,
    body: Value,
}

impl Envelope {
    /// `{"status":"ok"}` plus `detail` when there is any.
    pub fn success(detail: Params) -> Envelope {
        let mut body = Params::new();
        body.insert(KEY_STATUS.to_string(), Value::String(STATUS_OK.to_string()));
        if !detail.is_empty() {
            body.insert(KEY_DETAIL.to_string(), Value::Object(detail));
        }
        Envelope {
            http_status: HTTP_OK,
            body: Value::Object(body),
        }
    }

    pub fn fail(errors: Params) -> Envelope {
        let mut detail = Params::new();
        detail.insert(KEY_ERRORS.to_string(), Value::Object(errors));
        let mut body = Params::new();
        body.insert(KEY_STATUS.to_string(), Value::String(STATUS_FAIL.to_string()));
        body.insert(KEY_DETAIL.to_string(), Value::Object(detail));
        Envelope {
            http_status: HTTP_BAD_REQUEST,
            body: Value::Object(body),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The encoded body, exactly as it goes over the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.body.to_string().into_bytes()
    }
}

impl Reply for Envelope {
    fn into_response(self) -> warp::reply::Response {
        let status =
            StatusCode::from_u16(self.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warp::reply::with_status(warp::reply::json(&self.body), status).into_response()
    }
}

/// Per-parameter error messages collected while handling a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamErrors {
    errors: Params,
}

impl ParamErrors {
    pub fn new() -> ParamErrors {
        ParamErrors::default()
    }

    /// Record an error for `key`, replacing any earlier message.
    pub fn set(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(key.into(), Value::String(message.into()));
    }

    pub fn set_all<K, M, I>(&mut self, errors: I)
    where
        K: Into<String>,
        M: Into<String>,
        I: IntoIterator<Item = (K, M)>,
    {
        for (key, message) in errors {
            self.set(key, message);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.errors.get(key).and_then(Value::as_str)
    }

    pub fn into_envelope(self) -> Envelope {
        Envelope::fail(self.errors)
    }
}

/// Looks up an inbound parameter.
///
/// Unless `allow_array` is set, a list or map value (`key[0]=x` on the wire)
/// is refused with [`ERR_ARRAY_INVALID`], ready for [`ParamErrors::set`].
pub fn get_param<'a>(
    params: &'a Params,
    key: &str,
    allow_array: bool,
) -> Result<Option<&'a Value>, &'static str> {
    match params.get(key) {
        Some(Value::Array(_)) | Some(Value::Object(_)) if !allow_array => Err(ERR_ARRAY_INVALID),
        value => Ok(value),
    }
}
