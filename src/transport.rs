use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::normalize::{canonical_scalar, internal_key, Params};
use crate::response::HttpResponseRecord;
use crate::signature::{KEY_SALT, KEY_SIG, KEY_TIME};
use crate::JsonApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends a request and hands back the raw response.
///
/// Connection handling, TLS, retries and the like all live behind this trait.
pub trait Transport {
    fn send(&self, method: Method, path: &str, params: &Params) -> crate::Result<HttpResponseRecord>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, method: Method, path: &str, params: &Params) -> crate::Result<HttpResponseRecord> {
        (**self).send(method, path, params)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, method: Method, path: &str, params: &Params) -> crate::Result<HttpResponseRecord> {
        (**self).send(method, path, params)
    }
}

/// Flattens nested params into form/query pairs: `{"a":{"b":"c"}}` -> `a[b]=c`.
pub fn flatten_params(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten_value(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten_value(name: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                flatten_value(format!("{}[{}]", name, key), item, pairs);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(format!("{}[{}]", name, index), item, pairs);
            }
        }
        scalar => pairs.push((name, canonical_scalar(scalar))),
    }
}

/// Fails on any key, at any depth, that contains `[` or `]`.
///
/// Such a key would be read back as a nested name on the receiving end, so
/// the request could never be verified there.
pub fn check_form_keys(params: &Params) -> crate::Result<()> {
    for (key, value) in params {
        check_key(key, key)?;
        check_nested_keys(key, value)?;
    }
    Ok(())
}

fn check_nested_keys(name: &str, value: &Value) -> crate::Result<()> {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                let child = format!("{}[{}]", name, key);
                check_key(key, &child)?;
                check_nested_keys(&child, item)?;
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                check_nested_keys(&format!("{}[{}]", name, index), item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_key(key: &str, name: &str) -> crate::Result<()> {
    if key.contains('[') || key.contains(']') {
        return Err(JsonApiError::InvalidArgument(format!(
            "parameter name \"{}\" cannot be sent in a form: brackets are not allowed in keys",
            name
        )));
    }
    Ok(())
}

/// Rebuilds nested params from flattened pairs, the inverse of [`flatten_params`].
///
/// Nested maps whose keys are exactly `0..n` come back as lists. Empty
/// lists and maps never make it onto the wire, so they are not restored.
pub fn unflatten_params<I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut params = Params::new();
    for (name, value) in pairs {
        let (base, path) = split_name(&name);
        insert_path(&mut params, base, &path, value);
    }
    for value in params.values_mut() {
        restore_lists(value);
    }
    params
}

// `a[b][0]` -> ("a", ["b", "0"]); anything malformed is a plain key.
fn split_name(name: &str) -> (&str, Vec<&str>) {
    let open = match name.find('[') {
        Some(open) if open > 0 && name.ends_with(']') => open,
        _ => return (name, Vec::new()),
    };
    let inner = &name[open + 1..name.len() - 1];
    let segments: Vec<&str> = inner.split("][").collect();
    if segments.iter().any(|segment| segment.contains('[') || segment.contains(']')) {
        return (name, Vec::new());
    }
    (&name[..open], segments)
}

fn insert_path(map: &mut Params, key: &str, path: &[&str], value: String) {
    match path.split_first() {
        None => {
            map.insert(key.to_string(), Value::String(value));
        }
        Some((next, rest)) => {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Params::new()));
            if !entry.is_object() {
                *entry = Value::Object(Params::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, next, rest, value);
            }
        }
    }
}

fn restore_lists(value: &mut Value) {
    if let Value::Object(map) = value {
        for child in map.values_mut() {
            restore_lists(child);
        }
        let is_list = (0..map.len()).all(|index| map.contains_key(&index.to_string()));
        if is_list && !map.is_empty() {
            let items = (0..map.len())
                .filter_map(|index| map.get(&index.to_string()).cloned())
                .collect();
            *value = Value::Array(items);
        }
    }
}

/// `application/x-www-form-urlencoded` body for `params`.
pub fn encode_form(params: &Params) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(flatten_params(params).iter())
        .finish()
}

/// Builds `http://<hostname><path>?<params>`.
pub fn build_uri(hostname: &str, path: &str, params: &Params) -> crate::Result<Url> {
    if hostname.is_empty() {
        return Err(JsonApiError::Configuration(String::from(
            "Specify a target hostname for this client before sending requests.",
        )));
    }
    let mut uri = Url::parse(&format!("http://{}", hostname)).map_err(|err| {
        JsonApiError::Configuration(format!("invalid hostname \"{}\": {}", hostname, err))
    })?;
    uri.set_path(path);
    let pairs = flatten_params(params);
    if !pairs.is_empty() {
        uri.query_pairs_mut().extend_pairs(pairs.iter());
    }
    Ok(uri)
}

/// In-memory transport answering from seeded responses.
///
/// Responses are keyed by method (or any method) and by the request URI with
/// the signature fields left out, since those change on every call. Requests
/// nobody seeded get a 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    hostname: String,
    seeded: HashMap<(Option<Method>, String), (u16, Vec<u8>)>,
    sent: Mutex<Vec<(Method, String, Params)>>,
}

impl MockTransport {
    pub fn new(hostname: &str) -> MockTransport {
        MockTransport {
            hostname: hostname.to_string(),
            ..MockTransport::default()
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Seed the response for `path` + `params`; `method` of `None` matches any method.
    pub fn seed(
        &mut self,
        method: Option<Method>,
        path: &str,
        params: &Params,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> crate::Result<&mut MockTransport> {
        let key = self.content_key(path, params)?;
        self.seeded.insert((method, key), (status, body.into()));
        Ok(self)
    }

    pub fn seed_json(
        &mut self,
        method: Option<Method>,
        path: &str,
        params: &Params,
        status: u16,
        body: &Value,
    ) -> crate::Result<&mut MockTransport> {
        self.seed(method, path, params, status, body.to_string())
    }

    /// Every request sent so far, with the params exactly as received.
    pub fn sent(&self) -> Vec<(Method, String, Params)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    fn content_key(&self, path: &str, params: &Params) -> crate::Result<String> {
        let mut params = params.clone();
        for field in [KEY_SALT, KEY_TIME, KEY_SIG] {
            params.remove(&internal_key(field));
        }
        Ok(build_uri(&self.hostname, path, &params)?.to_string())
    }
}

impl Transport for MockTransport {
    fn send(&self, method: Method, path: &str, params: &Params) -> crate::Result<HttpResponseRecord> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((method, path.to_string(), params.clone()));
        }

        let key = self.content_key(path, params)?;
        let uri = build_uri(&self.hostname, path, params)?.to_string();
        let seeded = self
            .seeded
            .get(&(Some(method), key.clone()))
            .or_else(|| self.seeded.get(&(None, key)));

        match seeded {
            Some((status, body)) => {
                debug!("mock {} {} -> {}", method, uri, status);
                Ok(HttpResponseRecord::new(uri, *status, body.clone()))
            }
            None => {
                debug!("mock {} {} -> not seeded", method, uri);
                Ok(HttpResponseRecord::new(uri, 404, "Not Found"))
            }
        }
    }
}
