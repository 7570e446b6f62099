//!
//! Parameter normalization.
//!
//! Two parameter sets that mean the same thing must normalize to the same
//! value no matter how the caller built them: every leaf becomes a string,
//! every map is sorted with a natural case-insensitive collation and the
//! transport/framework keys at the top level are dropped.
//!
//! The result is shaped by what a form body can carry. A list `k[0]=a` is
//! indistinguishable from the map `{"0": "a"}`, so lists become index-keyed
//! maps, and empty lists or maps put nothing on the wire, so they are left out.
//!
use std::cmp::Ordering;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::JsonApiError;

/// Request or response parameters, keyed by name.
pub type Params = Map<String, Value>;

/// Prefix reserved for keys that are internal to the protocol.
pub const KEY_PREFIX: &str = "__jsonapi_";
/// Prefix of keys injected by the web framework on the receiving end.
pub const FRAMEWORK_PREFIX: &str = "sf_";
/// Maximum nesting accepted below the top-level map.
pub const MAX_DEPTH: usize = 32;

/// Canonical, all-string form of a parameter structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Text(String),
    /// Entries are kept sorted by [`natural_cmp`]. Lists are stored here too,
    /// keyed by index.
    Map(Vec<(String, Normalized)>),
}

impl Normalized {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Normalized::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Looks up a key in a map; `None` for anything else.
    fn is_empty_map(&self) -> bool {
        matches!(self, Normalized::Map(entries) if entries.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&Normalized> {
        match self {
            Normalized::Map(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Insert (or replace) a map entry, keeping the entries sorted.
    pub(crate) fn insert(&mut self, key: &str, value: Normalized) -> crate::Result<()> {
        match self {
            Normalized::Map(entries) => {
                match entries.binary_search_by(|(name, _)| natural_cmp(name, key)) {
                    Ok(index) => entries[index].1 = value,
                    Err(index) => entries.insert(index, (key.to_string(), value)),
                }
                Ok(())
            }
            _ => Err(JsonApiError::InvalidArgument(String::from(
                "entries can only be inserted into a map",
            ))),
        }
    }
}

/// Builds the protocol-internal name for `key`, e.g. `salt` -> `__jsonapi_salt`.
pub fn internal_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// Whether a top-level key is transport or framework metadata.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(KEY_PREFIX) || key.starts_with(FRAMEWORK_PREFIX)
}

/// Normalize a parameter set. The top level must be an object.
pub fn normalize(params: &Value) -> crate::Result<Normalized> {
    normalize_params(as_params(params)?)
}

pub fn normalize_params(params: &Params) -> crate::Result<Normalized> {
    let mut entries = Vec::with_capacity(params.len());
    for (key, value) in params {
        if is_reserved_key(key) {
            continue;
        }
        push_entry(&mut entries, key.clone(), normalize_value(value, 1)?);
    }
    sort_entries(&mut entries);
    Ok(Normalized::Map(entries))
}

fn push_entry(entries: &mut Vec<(String, Normalized)>, key: String, value: Normalized) {
    if !value.is_empty_map() {
        entries.push((key, value));
    }
}

fn normalize_value(value: &Value, depth: usize) -> crate::Result<Normalized> {
    if depth > MAX_DEPTH {
        return Err(JsonApiError::InvalidArgument(format!(
            "parameters nested deeper than {} levels",
            MAX_DEPTH
        )));
    }
    match value {
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                push_entry(&mut entries, key.clone(), normalize_value(item, depth + 1)?);
            }
            sort_entries(&mut entries);
            Ok(Normalized::Map(entries))
        }
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                push_entry(&mut entries, index.to_string(), normalize_value(item, depth + 1)?);
            }
            Ok(Normalized::Map(entries))
        }
        scalar => Ok(Normalized::Text(canonical_scalar(scalar))),
    }
}

fn sort_entries(entries: &mut Vec<(String, Normalized)>) {
    entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
}

/// String form of a scalar as both ends of the protocol see it.
///
/// `true` is `"1"`; `false` and `null` are empty. Composite values fall back
/// to their JSON text.
pub fn canonical_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => String::from("1"),
        Value::Bool(false) => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => canonical_number(number),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn canonical_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        int.to_string()
    } else if let Some(uint) = number.as_u64() {
        uint.to_string()
    } else {
        number.as_f64().map(canonical_float).unwrap_or_default()
    }
}

// Integral floats print like integers; everything else uses the shortest
// representation that round-trips, which for f64 never uses an exponent.
fn canonical_float(float: f64) -> String {
    if float.fract() == 0.0 && float.abs() < 1e15 {
        format!("{}", float as i64)
    } else {
        format!("{}", float)
    }
}

/// Canonical string value of a scalar field, if present.
pub fn scalar_field(params: &Params, key: &str) -> Option<String> {
    match params.get(key) {
        None | Some(Value::Array(_)) | Some(Value::Object(_)) => None,
        Some(value) => Some(canonical_scalar(value)),
    }
}

pub fn as_params(value: &Value) -> crate::Result<&Params> {
    value.as_object().ok_or_else(|| {
        JsonApiError::InvalidArgument(format!(
            "parameters must be a map, got {}",
            type_name(value)
        ))
    })
}

/// Converts any serializable struct or map into a parameter set.
pub fn to_params<T: Serialize>(value: &T) -> crate::Result<Params> {
    match serde_json::to_value(value)? {
        Value::Object(params) => Ok(params),
        other => Err(JsonApiError::InvalidArgument(format!(
            "parameters must be a map, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Natural, case-insensitive ordering: runs of digits compare by numeric
/// value and letters ignore ASCII case, so `item2 < Item10`. Keys that only
/// differ in case or leading zeros fall back to a byte comparison to keep the
/// order total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_cmp_ignore_case(a.as_bytes(), b.as_bytes()).then_with(|| a.cmp(b))
}

fn natural_cmp_ignore_case(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (start_a, start_b) = (i, j);
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let digits_a = trim_leading_zeros(&a[start_a..i]);
            let digits_b = trim_leading_zeros(&b[start_b..j]);
            let ord = digits_a
                .len()
                .cmp(&digits_b.len())
                .then_with(|| digits_a.cmp(digits_b));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].to_ascii_lowercase().cmp(&b[j].to_ascii_lowercase());
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|digit| **digit == b'0').count();
    &digits[zeros..]
}
