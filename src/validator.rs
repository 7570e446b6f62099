use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{event, Level};

use crate::normalize::{as_params, internal_key, scalar_field, Params};
use crate::settings::SignatureSettings;
use crate::signature::{Signer, KEY_SALT, KEY_SIG, KEY_TIME, SALT_BYTES};
use crate::time::create_timestamp;

/// Why an inbound request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationCode {
    Required,
    SaltMissing,
    SaltInvalid,
    TimestampMissing,
    TimestampInvalid,
    TimestampExpired,
    Invalid,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::Required => "required",
            ValidationCode::SaltMissing => "salt_missing",
            ValidationCode::SaltInvalid => "salt_invalid",
            ValidationCode::TimestampMissing => "timestamp_missing",
            ValidationCode::TimestampInvalid => "timestamp_invalid",
            ValidationCode::TimestampExpired => "timestamp_expired",
            ValidationCode::Invalid => "invalid",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ValidationCode::Required => "Request signature is required.",
            ValidationCode::SaltMissing => "Add a salt to the request to increase entropy.",
            ValidationCode::SaltInvalid => "Invalid salt provided with request.",
            ValidationCode::TimestampMissing => "Request timestamp not found.",
            ValidationCode::TimestampInvalid => "Request timestamp is invalid.",
            ValidationCode::TimestampExpired => "Request timestamp has expired.",
            ValidationCode::Invalid => "Invalid request signature.",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", .code.message())]
pub struct ValidationError {
    pub code: ValidationCode,
}

impl From<ValidationCode> for ValidationError {
    fn from(code: ValidationCode) -> Self {
        ValidationError { code }
    }
}

/// Receiver-side signature policy.
///
/// Checks that a request carries a signature, that its salt looks like one
/// we would have generated, that its timestamp is within `max_ttl` seconds
/// (when `max_ttl` is non-zero) and finally that the signature matches.
#[derive(Debug)]
pub struct SignatureValidator {
    signer: Signer,
    salt_required: bool,
    max_ttl: u64,
}

impl SignatureValidator {
    pub fn new(secret: &str, algorithm: &str) -> crate::Result<SignatureValidator> {
        Ok(SignatureValidator {
            signer: Signer::new(secret, algorithm)?,
            salt_required: true,
            max_ttl: 0,
        })
    }

    pub fn from_settings(settings: &SignatureSettings) -> crate::Result<SignatureValidator> {
        Ok(SignatureValidator::new(&settings.secret, &settings.algorithm)?
            .salt_required(settings.salt_required)
            .max_ttl(settings.max_ttl))
    }

    pub fn salt_required(mut self, salt_required: bool) -> SignatureValidator {
        self.salt_required = salt_required;
        self
    }

    /// Maximum request age in seconds; 0 turns the check off.
    ///
    /// Only age is bounded: a timestamp ahead of the local clock counts as
    /// age zero and is accepted.
    pub fn max_ttl(mut self, max_ttl: u64) -> SignatureValidator {
        self.max_ttl = max_ttl;
        self
    }

    pub fn validate(&self, params: &Value) -> crate::Result<()> {
        let params = as_params(params)?;
        Ok(self.validate_params_at(params, create_timestamp())?)
    }

    pub fn validate_params(&self, params: &Params) -> Result<(), ValidationError> {
        self.validate_params_at(params, create_timestamp())
    }

    /// Validate as if the current time were `now` (seconds since the epoch).
    pub fn validate_params_at(&self, params: &Params, now: u64) -> Result<(), ValidationError> {
        let result = self.check(params, now);
        if let Err(error) = &result {
            event!(Level::WARN, code = error.code.as_str(), "rejected request signature: {}", error);
        }
        result
    }

    fn check(&self, params: &Params, now: u64) -> Result<(), ValidationError> {
        let provided = non_empty(params, &internal_key(KEY_SIG)).ok_or(ValidationCode::Required)?;

        let salt = non_empty(params, &internal_key(KEY_SALT));
        if self.salt_required {
            match &salt {
                None => return Err(ValidationCode::SaltMissing.into()),
                Some(salt) if !is_valid_salt(salt) => {
                    return Err(ValidationCode::SaltInvalid.into())
                }
                Some(_) => {}
            }
        }

        if self.max_ttl > 0 {
            let time = non_empty(params, &internal_key(KEY_TIME))
                .ok_or(ValidationCode::TimestampMissing)?;
            if !time.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValidationCode::TimestampInvalid.into());
            }
            let time = time
                .parse::<u64>()
                .map_err(|_| ValidationCode::TimestampInvalid)?;
            if now.saturating_sub(time) > self.max_ttl {
                return Err(ValidationCode::TimestampExpired.into());
            }
        }

        // Unsalted or untimed requests cannot be recomputed and fail as invalid.
        let expected = self
            .signer
            .sign_params(params, true)
            .ok()
            .and_then(|signed| signed.get(&internal_key(KEY_SIG)).and_then(Value::as_str).map(String::from))
            .ok_or(ValidationCode::Invalid)?;
        ring::constant_time::verify_slices_are_equal(expected.as_bytes(), provided.as_bytes())
            .map_err(|_| ValidationCode::Invalid.into())
    }
}

fn non_empty(params: &Params, key: &str) -> Option<String> {
    scalar_field(params, key).filter(|value| !value.is_empty())
}

fn is_valid_salt(salt: &str) -> bool {
    salt.len() == SALT_BYTES * 2 && salt.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
