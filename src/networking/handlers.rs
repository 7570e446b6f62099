use std::convert::Infallible;
use std::sync::Arc;

use serde_json::Value;
use tracing::{event, Level};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::envelope::{get_param, Envelope, ParamErrors};
use crate::normalize::{canonical_scalar, internal_key, Params};
use crate::signature::KEY_SIG;
use crate::transport::unflatten_params;
use crate::validator::{SignatureValidator, ValidationError};

pub const ERR_REQUIRED: &str = "Required.";

/// Rejection raised when a request signature does not validate.
#[derive(Debug)]
pub struct InvalidSignature(pub ValidationError);

impl warp::reject::Reject for InvalidSignature {}

pub async fn verify_signed_form(
    form: Vec<(String, String)>,
    validator: Arc<SignatureValidator>,
) -> Result<Params, Rejection> {
    let params = unflatten_params(form);
    match validator.validate_params(&params) {
        Ok(()) => Ok(params),
        Err(error) => Err(warp::reject::custom(InvalidSignature(error))),
    }
}

pub fn echo_handler(params: Params) -> Envelope {
    let result = get_param(&params, "result", false).and_then(|value| {
        match value.map(canonical_scalar) {
            Some(result) if !result.is_empty() => Ok(result),
            _ => Err(ERR_REQUIRED),
        }
    });
    match result {
        Ok(result) => {
            let mut detail = Params::new();
            detail.insert(String::from("result"), Value::String(result));
            Envelope::success(detail)
        }
        Err(message) => {
            let mut errors = ParamErrors::new();
            errors.set("result", message);
            errors.into_envelope()
        }
    }
}

/// Signature rejections become a fail envelope; unknown routes and methods a 404.
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(InvalidSignature(error)) = err.find::<InvalidSignature>() {
        let mut errors = ParamErrors::new();
        errors.set(internal_key(KEY_SIG), error.to_string());
        return Ok(errors.into_envelope().into_response());
    }

    let status = if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        StatusCode::NOT_FOUND
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        event!(Level::ERROR, "unhandled rejection {:?}", err);
        StatusCode::BAD_REQUEST
    };
    Ok(warp::reply::with_status(status.canonical_reason().unwrap_or(""), status).into_response())
}
