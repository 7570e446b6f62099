//!
//! Client-side response classification.
//!
//! Whatever comes back over the network ends up as exactly one of
//! [`ClassifiedResponse::Success`], [`ClassifiedResponse::Failure`] or
//! [`ClassifiedResponse::Error`]. [`classify`] never fails; callers that
//! prefer `?` can project a response into a [`ResponseError`].
//!
use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use warp::http::StatusCode;

use crate::envelope::{
    HTTP_BAD_REQUEST, HTTP_OK, KEY_DETAIL, KEY_ERRORS, KEY_STATUS, STATUS_FAIL, STATUS_OK,
};
use crate::error::ResponseError;
use crate::normalize::Params;
use crate::JsonApiError;

pub const ERR_NO_STATUS: &str = "No status property returned from API server.";

/// What the transport handed back for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponseRecord {
    uri: String,
    status: u16,
    body: Vec<u8>,
}

impl HttpResponseRecord {
    pub fn new(uri: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> HttpResponseRecord {
        HttpResponseRecord {
            uri: uri.into(),
            status,
            body: body.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase for the status code, empty if the code is unknown.
    pub fn status_text(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClassifiedResponse {
    /// HTTP 200 with `"status":"ok"`.
    Success { detail: Params },
    /// HTTP 400 with `"status":"fail"`; `errors` maps parameter names to messages.
    Failure { errors: Params },
    /// Anything else.
    Error { cause: String },
}

/// A classified response together with the exchange it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    record: HttpResponseRecord,
    classified: ClassifiedResponse,
}

/// Classify a transport response. Total: every input maps to one outcome.
pub fn classify(record: HttpResponseRecord) -> ApiResponse {
    let classified = classify_record(&record);
    match &classified {
        ClassifiedResponse::Success { .. } => {
            debug!("{} {} -> success", record.status(), record.uri())
        }
        ClassifiedResponse::Failure { errors } => debug!(
            "{} {} -> failure ({} errors)",
            record.status(),
            record.uri(),
            errors.len()
        ),
        ClassifiedResponse::Error { cause } => {
            warn!("{} {} -> error: {}", record.status(), record.uri(), cause)
        }
    }
    ApiResponse { record, classified }
}

fn classify_record(record: &HttpResponseRecord) -> ClassifiedResponse {
    let expected = match record.status() {
        HTTP_OK => STATUS_OK,
        HTTP_BAD_REQUEST => STATUS_FAIL,
        status => {
            return error(format!(
                "Got unexpected HTTP status {} (\"{}\")",
                status,
                record.status_text()
            ))
        }
    };

    let decoded: Value = match serde_json::from_slice(record.body()) {
        Ok(decoded) => decoded,
        Err(_) => {
            return error(format!(
                "Server returned {} status, but response is not JSON-encoded.",
                record.status()
            ))
        }
    };

    let found = match decoded.get(KEY_STATUS) {
        None | Some(Value::Null) => return error(String::from(ERR_NO_STATUS)),
        Some(Value::String(status)) if status.is_empty() => {
            return error(String::from(ERR_NO_STATUS))
        }
        Some(Value::String(status)) => Cow::Borrowed(status.as_str()),
        Some(other) => Cow::Owned(other.to_string()),
    };
    if found != expected {
        return error(format!(
            "Invalid status property returned from API server:  \"{}\" expected, \"{}\" found",
            expected, found
        ));
    }

    let detail = decoded.get(KEY_DETAIL);
    if expected == STATUS_OK {
        ClassifiedResponse::Success {
            detail: coerce_map(detail),
        }
    } else {
        ClassifiedResponse::Failure {
            errors: coerce_map(detail.and_then(|detail| detail.get(KEY_ERRORS))),
        }
    }
}

fn error(cause: String) -> ClassifiedResponse {
    ClassifiedResponse::Error { cause }
}

// Lists become index-keyed maps and scalars a single "0" entry.
fn coerce_map(value: Option<&Value>) -> Params {
    match value {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect(),
        Some(scalar) => {
            let mut map = Params::new();
            map.insert(String::from("0"), scalar.clone());
            map
        }
    }
}

impl ApiResponse {
    pub fn record(&self) -> &HttpResponseRecord {
        &self.record
    }

    pub fn classified(&self) -> &ClassifiedResponse {
        &self.classified
    }

    pub fn into_parts(self) -> (HttpResponseRecord, ClassifiedResponse) {
        (self.record, self.classified)
    }

    pub fn uri(&self) -> &str {
        self.record.uri()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.classified, ClassifiedResponse::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.classified, ClassifiedResponse::Failure { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.classified, ClassifiedResponse::Error { .. })
    }

    /// Detail map of a Success.
    pub fn detail(&self) -> Option<&Params> {
        match &self.classified {
            ClassifiedResponse::Success { detail } => Some(detail),
            _ => None,
        }
    }

    /// Error map of a Failure.
    pub fn errors(&self) -> Option<&Params> {
        match &self.classified {
            ClassifiedResponse::Failure { errors } => Some(errors),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match &self.classified {
            ClassifiedResponse::Error { cause } => Some(cause),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.detail().and_then(|detail| detail.get(key))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Deserialize one detail field; `None` if it is absent or has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Project a Failure or Error into an error value.
    ///
    /// `message` overrides the default summary. Projecting a Success is a
    /// caller mistake and yields [`JsonApiError::Logic`].
    pub fn to_error(&self, message: Option<&str>) -> crate::Result<ResponseError> {
        let (default_message, errors) = match &self.classified {
            ClassifiedResponse::Success { .. } => {
                return Err(JsonApiError::Logic(String::from(
                    "a successful response cannot be converted into an error",
                )))
            }
            ClassifiedResponse::Failure { errors } => (
                format!(
                    "Bad parameters: [{}]",
                    errors.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
                errors.clone(),
            ),
            ClassifiedResponse::Error { cause } => (cause.clone(), Params::new()),
        };
        Ok(ResponseError::new(
            message.map(String::from).unwrap_or(default_message),
            self.record.status(),
            self.record.uri(),
            &self.record.body_text(),
            errors,
        ))
    }

    /// The detail of a Success, or the projected error for anything else.
    pub fn into_detail(self) -> crate::Result<Params> {
        match self.classified {
            ClassifiedResponse::Success { detail } => Ok(detail),
            _ => Err(JsonApiError::Response(self.to_error(None)?)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::{Envelope, ParamErrors};
    use serde_json::json;

    const URI: &str = "http://localhost/jsonapi_test";

    fn respond(status: u16, body: &str) -> ApiResponse {
        classify(HttpResponseRecord::new(URI, status, body.as_bytes()))
    }

    #[test]
    fn success_test() {
        let response = respond(200, r#"{"status":"ok","detail":{"result":"fifteen","n":15}}"#);
        assert!(response.is_success());
        assert_eq!(response.get_str("result"), Some("fifteen"));
        assert_eq!(response.get_as::<u32>("n"), Some(15));
        assert_eq!(response.get_as::<u32>("result"), None);
        assert!(response.errors().is_none());
    }

    #[test]
    fn success_without_detail_test() {
        let response = respond(200, r#"{"status":"ok"}"#);
        assert_eq!(response.detail(), Some(&Params::new()));
    }

    #[test]
    fn failure_test() {
        let response = respond(
            400,
            r#"{"status":"fail","detail":{"errors":{"result":"Required."}}}"#,
        );
        assert!(response.is_failure());
        let errors = response.errors().unwrap();
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["result"]);
        assert_eq!(errors.get("result"), Some(&json!("Required.")));
    }

    #[test]
    fn failure_errors_are_coerced_test() {
        let missing = respond(400, r#"{"status":"fail"}"#);
        assert_eq!(missing.errors(), Some(&Params::new()));

        let listed = respond(400, r#"{"status":"fail","detail":{"errors":["bad","worse"]}}"#);
        let errors = listed.errors().unwrap();
        assert_eq!(errors.get("0"), Some(&json!("bad")));
        assert_eq!(errors.get("1"), Some(&json!("worse")));

        let scalar = respond(400, r#"{"status":"fail","detail":{"errors":"bad"}}"#);
        assert_eq!(scalar.errors().unwrap().get("0"), Some(&json!("bad")));
    }

    #[test]
    fn garbage_body_test() {
        let response = respond(200, "This is not JSON.");
        assert_eq!(
            response.cause(),
            Some("Server returned 200 status, but response is not JSON-encoded.")
        );
        assert!(respond(400, "").is_error());
    }

    #[test]
    fn missing_status_test() {
        for body in [r#"{"detail":{}}"#, r#"{"status":""}"#, r#"{"status":null}"#, "[1,2]", "null", "\"ok\""] {
            let response = respond(200, body);
            assert_eq!(response.cause(), Some(ERR_NO_STATUS), "{}", body);
        }
    }

    #[test]
    fn status_mismatch_test() {
        let response = respond(200, r#"{"status":"fail","detail":{"errors":{}}}"#);
        assert_eq!(
            response.cause(),
            Some("Invalid status property returned from API server:  \"ok\" expected, \"fail\" found")
        );
        assert!(respond(400, r#"{"status":"ok"}"#).is_error());
        assert!(respond(200, r#"{"status":"OK"}"#).is_error());
        assert!(respond(200, r#"{"status":true}"#).is_error());
    }

    #[test]
    fn unexpected_http_status_test() {
        let response = respond(500, r#"{"status":"ok"}"#);
        assert_eq!(
            response.cause(),
            Some("Got unexpected HTTP status 500 (\"Internal Server Error\")")
        );
        assert_eq!(
            respond(799, "").cause(),
            Some("Got unexpected HTTP status 799 (\"\")")
        );
    }

    #[test]
    fn classification_is_total_test() {
        let bodies: Vec<Vec<u8>> = vec![
            vec![],
            vec![0xff, 0xfe, 0x00],
            b"{".to_vec(),
            b"{\"status\":{\"nested\":1}}".to_vec(),
            b"{\"status\":\"ok\",\"detail\":42}".to_vec(),
            b"{\"status\":\"fail\",\"detail\":\"flat\"}".to_vec(),
            b"12345".to_vec(),
        ];
        for status in [0u16, 100, 200, 204, 301, 400, 401, 404, 500, 503, u16::MAX] {
            for body in &bodies {
                let response = classify(HttpResponseRecord::new(URI, status, body.clone()));
                let outcomes = [response.is_success(), response.is_failure(), response.is_error()];
                assert_eq!(outcomes.iter().filter(|outcome| **outcome).count(), 1);
            }
        }
    }

    #[test]
    fn envelope_builders_are_accepted_test() {
        let mut detail = Params::new();
        detail.insert(String::from("result"), json!("fifteen"));
        let success = Envelope::success(detail.clone());
        let response = classify(HttpResponseRecord::new(URI, success.http_status(), success.to_bytes()));
        assert_eq!(response.detail(), Some(&detail));

        let mut errors = ParamErrors::new();
        errors.set("result", "Required.");
        let fail = errors.into_envelope();
        let response = classify(HttpResponseRecord::new(URI, fail.http_status(), fail.to_bytes()));
        assert_eq!(response.errors().unwrap().get("result"), Some(&json!("Required.")));
    }

    #[test]
    fn failure_projection_test() {
        let response = respond(
            400,
            r#"{"status":"fail","detail":{"errors":{"result":"Required.","count":"Too small."}}}"#,
        );
        let error = response.to_error(None).unwrap();
        assert_eq!(error.message(), "Bad parameters: [result, count]");
        assert_eq!(error.status(), 400);
        assert_eq!(error.uri(), URI);
        assert_eq!(error.errors().len(), 2);

        let custom = response.to_error(Some("try again")).unwrap();
        assert_eq!(custom.message(), "try again");
    }

    #[test]
    fn error_projection_test() {
        let body = "x".repeat(200);
        let response = respond(502, &body);
        let error = response.to_error(None).unwrap();
        assert_eq!(error.message(), "Got unexpected HTTP status 502 (\"Bad Gateway\")");
        assert_eq!(error.status(), 502);
        assert_eq!(error.preview(), format!("{}...", "x".repeat(80)));
        assert!(error.errors().is_empty());
        assert_eq!(
            error.to_string(),
            format!(
                "[502] API Server returned error:  Got unexpected HTTP status 502 (\"Bad Gateway\") from {} (\"{}...\")",
                URI,
                "x".repeat(80)
            )
        );
    }

    #[test]
    fn success_projection_is_a_logic_error_test() {
        let response = respond(200, r#"{"status":"ok"}"#);
        assert!(matches!(response.to_error(None), Err(JsonApiError::Logic(_))));
    }

    #[test]
    fn into_detail_test() {
        let detail = respond(200, r#"{"status":"ok","detail":{"a":"1"}}"#)
            .into_detail()
            .unwrap();
        assert_eq!(detail.get("a"), Some(&json!("1")));

        match respond(200, "oops").into_detail() {
            Err(JsonApiError::Response(error)) => assert_eq!(error.preview(), "oops"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
