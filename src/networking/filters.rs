use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::normalize::Params;
use crate::validator::SignatureValidator;

use super::handlers::{echo_handler, handle_rejection, verify_signed_form};

/// Largest form body accepted, in bytes.
pub const MAX_FORM_BYTES: u64 = 64 * 1024;

/// Every route of the service, with rejections rendered as responses.
pub fn routes(
    validator: Arc<SignatureValidator>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    echo_route_filter(validator).recover(handle_rejection)
}

/// POST /jsonapi_test: echoes the required `result` parameter back.
pub fn echo_route_filter(
    validator: Arc<SignatureValidator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path("jsonapi_test"))
        .and(warp::path::end())
        .and(signed_form(validator))
        .map(echo_handler)
}

/// Form-encoded params whose signature checks out.
pub fn signed_form(
    validator: Arc<SignatureValidator>,
) -> impl Filter<Extract = (Params,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_FORM_BYTES)
        .and(warp::body::form::<Vec<(String, String)>>())
        .and(with_validator(validator))
        .and_then(verify_signed_form)
}

/// inject the signature validator
fn with_validator(
    validator: Arc<SignatureValidator>,
) -> impl Filter<Extract = (Arc<SignatureValidator>,), Error = Infallible> + Clone {
    warp::any().map(move || validator.clone())
}
