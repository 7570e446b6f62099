//!
//! Request signatures.
//!
//! A signature is the hex digest of `secret || serialize(normalize(params))`
//! where the digested params carry the salt and timestamp, so tampering with
//! either one breaks the signature. Freshness of the timestamp is not checked
//! here; see [`crate::validator::SignatureValidator`].
//!
use std::fmt;
use std::fmt::Write;

use rand::RngCore;
use ring::{constant_time, digest};
use serde_json::Value;
use tracing::debug;

use crate::normalize::{as_params, internal_key, normalize_params, scalar_field, Normalized, Params};
use crate::time::create_timestamp;
use crate::JsonApiError;

pub const KEY_SALT: &str = "salt";
pub const KEY_TIME: &str = "time";
pub const KEY_SIG: &str = "sig";

pub const DEFAULT_ALGORITHM: &str = "sha512";
/// Random bytes per salt; hex-encoded this gives 40 characters.
pub const SALT_BYTES: usize = 20;

/// Names accepted by [`Signer::new`].
pub const SUPPORTED_ALGORITHMS: [&str; 5] = ["sha1", "sha256", "sha384", "sha512", "sha512/256"];

pub fn digest_algorithm(name: &str) -> Option<&'static digest::Algorithm> {
    match name.to_ascii_lowercase().as_str() {
        "sha1" => Some(&digest::SHA1_FOR_LEGACY_USE_ONLY),
        "sha256" => Some(&digest::SHA256),
        "sha384" => Some(&digest::SHA384),
        "sha512" => Some(&digest::SHA512),
        "sha512/256" => Some(&digest::SHA512_256),
        _ => None,
    }
}

/// Source of the anti-replay fields injected into freshly signed params.
pub trait Entropy: Send + Sync {
    fn salt(&self) -> String;
    fn timestamp(&self) -> String;
}

/// Random salt, wall-clock timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    fn salt(&self) -> String {
        let mut bytes = [0u8; SALT_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn timestamp(&self) -> String {
        create_timestamp().to_string()
    }
}

/// Always hands out the same salt and timestamp, for reproducible signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedEntropy {
    salt: String,
    time: u64,
}

impl FixedEntropy {
    pub fn new(salt: impl Into<String>, time: u64) -> FixedEntropy {
        FixedEntropy {
            salt: salt.into(),
            time,
        }
    }
}

impl Entropy for FixedEntropy {
    fn salt(&self) -> String {
        self.salt.clone()
    }

    fn timestamp(&self) -> String {
        self.time.to_string()
    }
}

/// Signs and verifies parameter sets with a shared secret.
///
/// Read-only once built, so a single instance can be shared between threads.
pub struct Signer {
    key: String,
    algorithm_name: String,
    algorithm: &'static digest::Algorithm,
    entropy: Box<dyn Entropy>,
}

impl Signer {
    /// Create a signer for `key` using the named digest algorithm.
    pub fn new(key: &str, algorithm: &str) -> crate::Result<Signer> {
        if key.is_empty() {
            return Err(JsonApiError::Configuration(String::from(
                "signature key must not be empty",
            )));
        }
        let digest = digest_algorithm(algorithm).ok_or_else(|| {
            JsonApiError::Configuration(format!(
                "Unknown hash algorithm \"{}\"; expected one of {}",
                algorithm,
                SUPPORTED_ALGORITHMS.join(", ")
            ))
        })?;
        Ok(Signer {
            key: key.to_string(),
            algorithm_name: algorithm.to_ascii_lowercase(),
            algorithm: digest,
            entropy: Box::new(SystemEntropy),
        })
    }

    /// Replace the salt/timestamp source.
    pub fn with_entropy(mut self, entropy: impl Entropy + 'static) -> Signer {
        self.entropy = Box::new(entropy);
        self
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm_name
    }

    /// Returns a copy of `params` with salt, timestamp and signature added.
    ///
    /// With `preserve_existing` the salt and timestamp already in `params`
    /// are reused instead of generated, which is how a receiver recomputes
    /// the signature of an inbound request.
    pub fn sign(&self, params: &Value, preserve_existing: bool) -> crate::Result<Params> {
        self.sign_params(as_params(params)?, preserve_existing)
    }

    pub fn sign_params(&self, params: &Params, preserve_existing: bool) -> crate::Result<Params> {
        let salt_key = internal_key(KEY_SALT);
        let time_key = internal_key(KEY_TIME);

        let (salt, time) = if preserve_existing {
            (
                required_field(params, &salt_key)?,
                required_field(params, &time_key)?,
            )
        } else {
            (self.entropy.salt(), self.entropy.timestamp())
        };

        let signature = self.compute(params, &salt, &time)?;

        let mut signed = params.clone();
        signed.insert(salt_key, Value::String(salt));
        signed.insert(time_key, Value::String(time));
        signed.insert(internal_key(KEY_SIG), Value::String(signature));
        Ok(signed)
    }

    /// Recompute the signature of already-salted params.
    pub fn signature(&self, params: &Value) -> crate::Result<String> {
        let params = as_params(params)?;
        self.compute(
            params,
            &required_field(params, &internal_key(KEY_SALT))?,
            &required_field(params, &internal_key(KEY_TIME))?,
        )
    }

    /// Whether the signature carried by `params` matches their content.
    pub fn verify(&self, params: &Value) -> crate::Result<bool> {
        let provided = required_field(as_params(params)?, &internal_key(KEY_SIG))?;
        let expected = self.signature(params)?;
        Ok(constant_time::verify_slices_are_equal(expected.as_bytes(), provided.as_bytes()).is_ok())
    }

    fn compute(&self, params: &Params, salt: &str, time: &str) -> crate::Result<String> {
        let mut payload = normalize_params(params)?;
        payload.insert(&internal_key(KEY_SALT), Normalized::Text(salt.to_string()))?;
        payload.insert(&internal_key(KEY_TIME), Normalized::Text(time.to_string()))?;

        let serialized = serialize(&payload);
        let mut context = digest::Context::new(self.algorithm);
        context.update(self.key.as_bytes());
        context.update(serialized.as_bytes());
        let signature = hex::encode(context.finish());
        debug!(
            "signed {} payload bytes with {}",
            serialized.len(),
            self.algorithm_name
        );
        Ok(signature)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm_name)
            .finish()
    }
}

fn required_field(params: &Params, key: &str) -> crate::Result<String> {
    match scalar_field(params, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(JsonApiError::MissingField(key.to_string())),
    }
}

/// Length-prefixed encoding of a normalized structure.
///
/// Strings are `s:<bytes>:"<text>";` and maps `a:<n>:{<key><value>...}`.
/// Map keys that are canonical decimal integers are written `i:<n>;`,
/// matching what peers with integer-keyed maps produce. Lists reach this
/// point already folded into index-keyed maps.
pub fn serialize(value: &Normalized) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Normalized) {
    match value {
        Normalized::Text(text) => write_string(out, text),
        Normalized::Map(entries) => {
            let _ = write!(out, "a:{}:{{", entries.len());
            for (key, item) in entries {
                if is_integer_key(key) {
                    let _ = write!(out, "i:{};", key);
                } else {
                    write_string(out, key);
                }
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    let _ = write!(out, "s:{}:\"{}\";", text.len(), text);
}

fn is_integer_key(key: &str) -> bool {
    let digits = key.strip_prefix('-').unwrap_or(key);
    let canonical = match digits.as_bytes() {
        [] => false,
        [b'0'] => digits.len() == key.len(),
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
    };
    canonical && key.parse::<i64>().is_ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    const KEY: &str = "correct horse battery staple";
    const SALT: &str = "0123456789abcdef0123456789abcdef01234567";

    fn fixed_signer() -> Signer {
        Signer::new(KEY, DEFAULT_ALGORITHM)
            .unwrap()
            .with_entropy(FixedEntropy::new(SALT, 1_300_000_000))
    }

    fn reference_digest(payload: &str) -> String {
        let mut context = digest::Context::new(&digest::SHA512);
        context.update(KEY.as_bytes());
        context.update(payload.as_bytes());
        hex::encode(context.finish())
    }

    #[test]
    fn signer_new_test() {
        assert!(Signer::new(KEY, "sha512").is_ok());
        assert!(Signer::new(KEY, "SHA256").is_ok());
        assert!(Signer::new(KEY, "sha512/256").is_ok());
        assert!(matches!(
            Signer::new("", "sha512"),
            Err(JsonApiError::Configuration(_))
        ));
        assert!(matches!(
            Signer::new(KEY, "md7"),
            Err(JsonApiError::Configuration(_))
        ));
    }

    #[test]
    fn serialize_test() {
        let normalized = normalize(&json!({"b": "2", "a": "x", "10": "ten"})).unwrap();
        assert_eq!(
            serialize(&normalized),
            "a:3:{i:10;s:3:\"ten\";s:1:\"a\";s:1:\"x\";s:1:\"b\";s:1:\"2\";}"
        );
        let nested = normalize(&json!({"k": ["v", {"z": "1"}]})).unwrap();
        assert_eq!(
            serialize(&nested),
            "a:1:{s:1:\"k\";a:2:{i:0;s:1:\"v\";i:1;a:1:{s:1:\"z\";s:1:\"1\";}}}"
        );
    }

    #[test]
    fn lists_serialize_like_index_maps_test() {
        let items: Vec<String> = (0..12).map(|index| format!("v{}", index)).collect();
        let map: Params = items
            .iter()
            .enumerate()
            .rev()
            .map(|(index, item)| (index.to_string(), json!(item)))
            .collect();
        let list = normalize(&json!({ "k": items })).unwrap();
        let map = normalize(&json!({ "k": map })).unwrap();
        assert_eq!(serialize(&list), serialize(&map));
    }

    #[test]
    fn empty_containers_do_not_affect_signature_test() {
        let signer = fixed_signer();
        let plain = signer.sign(&json!({"result": "fifteen"}), false).unwrap();
        let padded = signer
            .sign(&json!({"result": "fifteen", "tags": [], "opts": {"none": {}}}), false)
            .unwrap();
        assert_eq!(plain.get("__jsonapi_sig"), padded.get("__jsonapi_sig"));
    }

    #[test]
    fn is_integer_key_test() {
        assert!(is_integer_key("0"));
        assert!(is_integer_key("42"));
        assert!(is_integer_key("-7"));
        assert!(!is_integer_key("-0"));
        assert!(!is_integer_key("007"));
        assert!(!is_integer_key(""));
        assert!(!is_integer_key("1.5"));
        assert!(!is_integer_key("99999999999999999999"));
    }

    #[test]
    fn sign_adds_reserved_fields_test() {
        let signed = fixed_signer().sign(&json!({"result": "fifteen"}), false).unwrap();
        assert_eq!(signed.get("result"), Some(&json!("fifteen")));
        assert_eq!(signed.get("__jsonapi_salt"), Some(&json!(SALT)));
        assert_eq!(signed.get("__jsonapi_time"), Some(&json!("1300000000")));

        let expected = reference_digest(&format!(
            "a:3:{{s:14:\"__jsonapi_salt\";s:40:\"{}\";s:14:\"__jsonapi_time\";s:10:\"1300000000\";s:6:\"result\";s:7:\"fifteen\";}}",
            SALT
        ));
        assert_eq!(signed.get("__jsonapi_sig"), Some(&Value::String(expected)));
    }

    #[test]
    fn sign_generates_fresh_entropy_test() {
        let signer = Signer::new(KEY, DEFAULT_ALGORITHM).unwrap();
        let first = signer.sign(&json!({"a": "1"}), false).unwrap();
        let second = signer.sign(&json!({"a": "1"}), false).unwrap();
        let salt = first.get("__jsonapi_salt").and_then(Value::as_str).unwrap();
        assert_eq!(salt.len(), 40);
        assert!(salt.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(first.get("__jsonapi_salt"), second.get("__jsonapi_salt"));
        assert_ne!(first.get("__jsonapi_sig"), second.get("__jsonapi_sig"));
    }

    #[test]
    fn sign_preserving_existing_reproduces_signature_test() {
        let signed = fixed_signer().sign(&json!({"a": "1", "b": [1, 2]}), false).unwrap();
        let other = Signer::new(KEY, DEFAULT_ALGORITHM).unwrap();
        let resigned = other.sign_params(&signed, true).unwrap();
        assert_eq!(resigned.get("__jsonapi_sig"), signed.get("__jsonapi_sig"));
        assert_eq!(
            other.signature(&Value::Object(signed.clone())).unwrap(),
            signed.get("__jsonapi_sig").and_then(Value::as_str).unwrap()
        );
    }

    #[test]
    fn sign_preserving_requires_salt_and_time_test() {
        let signer = fixed_signer();
        assert!(matches!(
            signer.sign(&json!({"a": "1"}), true),
            Err(JsonApiError::MissingField(field)) if field == "__jsonapi_salt"
        ));
        assert!(matches!(
            signer.sign(&json!({"a": "1", "__jsonapi_salt": SALT}), true),
            Err(JsonApiError::MissingField(field)) if field == "__jsonapi_time"
        ));
        assert!(signer
            .sign(&json!({"__jsonapi_salt": SALT, "__jsonapi_time": 1300000000}), true)
            .is_ok());
    }

    #[test]
    fn sign_rejects_non_map_test() {
        assert!(matches!(
            fixed_signer().sign(&json!("a=1"), false),
            Err(JsonApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_round_trip_test() {
        for algorithm in SUPPORTED_ALGORITHMS.iter() {
            let signer = Signer::new(KEY, algorithm).unwrap();
            let signed = signer
                .sign(&json!({"a": "1", "nested": {"x": 2.5, "y": [true, null]}}), false)
                .unwrap();
            assert!(signer.verify(&Value::Object(signed)).unwrap(), "{}", algorithm);
        }
    }

    #[test]
    fn verify_detects_tampering_test() {
        let signer = fixed_signer();
        let signed = signer.sign(&json!({"a": "1"}), false).unwrap();

        let mut flipped = signed.clone();
        let sig = flipped["__jsonapi_sig"].as_str().unwrap().to_string();
        let first = if sig.starts_with('0') { "1" } else { "0" };
        flipped.insert(
            String::from("__jsonapi_sig"),
            Value::String(format!("{}{}", first, &sig[1..])),
        );
        assert!(!signer.verify(&Value::Object(flipped)).unwrap());

        for (key, value) in [
            ("a", "2"),
            ("__jsonapi_salt", "1123456789abcdef0123456789abcdef01234567"),
            ("__jsonapi_time", "1300000001"),
        ] {
            let mut tampered = signed.clone();
            tampered.insert(key.to_string(), json!(value));
            assert!(!signer.verify(&Value::Object(tampered)).unwrap(), "{}", key);
        }

        let other_key = Signer::new("another secret", DEFAULT_ALGORITHM).unwrap();
        assert!(!other_key.verify(&Value::Object(signed)).unwrap());
    }

    #[test]
    fn verify_requires_signature_test() {
        assert!(matches!(
            fixed_signer().verify(&json!({"__jsonapi_salt": SALT, "__jsonapi_time": "1"})),
            Err(JsonApiError::MissingField(field)) if field == "__jsonapi_sig"
        ));
    }

    #[test]
    fn reserved_keys_do_not_affect_signature_test() {
        let signer = fixed_signer();
        let plain = signer.sign(&json!({"a": "1"}), false).unwrap();
        let noisy = signer
            .sign(
                &json!({"a": "1", "__jsonapi_debug": "yes", "sf_format": "json"}),
                false,
            )
            .unwrap();
        assert_eq!(plain.get("__jsonapi_sig"), noisy.get("__jsonapi_sig"));
        assert_eq!(noisy.get("sf_format"), Some(&json!("json")));
    }

    #[test]
    fn key_order_does_not_affect_signature_test() {
        let signer = fixed_signer();
        let first = signer.sign(&json!({"b": "2", "a": "1", "C": {"y": 1, "x": 2}}), false).unwrap();
        let mut reordered = Params::new();
        reordered.insert(String::from("C"), json!({"x": 2, "y": 1}));
        reordered.insert(String::from("a"), json!(1));
        reordered.insert(String::from("b"), json!(2));
        let second = signer.sign_params(&reordered, false).unwrap();
        assert_eq!(first.get("__jsonapi_sig"), second.get("__jsonapi_sig"));
    }

    #[test]
    fn debug_hides_key_test() {
        let output = format!("{:?}", fixed_signer());
        assert!(!output.contains(KEY));
        assert!(output.contains("sha512"));
    }
}
