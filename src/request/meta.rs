//! Outgoing header assembly and incoming header splitting

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::collections::BTreeMap;

use crate::auth::Provider;
use crate::error::{Error, Result};

/// Caller-supplied pieces of one request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub path: String,
    /// Query parameters merged into the path before signing
    pub params: BTreeMap<String, String>,
    /// Plain headers, sent as given (lower-cased)
    pub headers: BTreeMap<String, String>,
    /// Provider headers, sent with the provider header prefix
    pub cloud_headers: BTreeMap<String, String>,
    /// User metadata, sent with the provider metadata prefix
    pub metadata: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn cloud_header(mut self, name: &str, value: impl ToString) -> Self {
        self.cloud_headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Merge extra options on top of these; `other` wins on key collision
    pub fn merged(mut self, other: &RequestOptions) -> Self {
        self.params.extend(other.params.clone());
        self.headers.extend(other.headers.clone());
        self.cloud_headers.extend(other.cloud_headers.clone());
        self.metadata.extend(other.metadata.clone());
        self
    }

    /// Path with `params` merged into its query string
    pub fn full_path(&self) -> String {
        merge_query(if self.path.is_empty() { "/" } else { &self.path }, &self.params)
    }

    /// Assemble the outgoing header map.
    ///
    /// Order is metadata, then cloud headers, then plain headers; a later
    /// group overrides an earlier one on collision.
    pub fn assemble_headers(&self, provider: &Provider) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.metadata {
            insert(&mut headers, &format!("{}{}", provider.metadata_prefix, key.to_lowercase()), value)?;
        }
        for (key, value) in &self.cloud_headers {
            insert(&mut headers, &format!("{}{}", provider.header_prefix, key.to_lowercase()), value)?;
        }
        for (key, value) in &self.headers {
            insert(&mut headers, &key.to_lowercase(), value)?;
        }
        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::usage(format!("Invalid header name {:?}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::usage(format!("Invalid value for header {}: {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}

/// Merge query parameters into a path, replacing same-named existing ones
pub fn merge_query(path: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let (base, query) = match path.split_once('?') {
        Some((base, query)) => (base, query),
        None => (path, ""),
    };

    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            let key = urlencoding::decode(key).map(|k| k.into_owned()).unwrap_or_else(|_| key.to_string());
            !params.contains_key(&key)
        })
        .map(str::to_string)
        .collect();

    for (key, value) in params {
        pairs.push(format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)));
    }

    format!("{}?{}", base, pairs.join("&"))
}

/// Header prefixes used to split a response
#[derive(Debug, Clone)]
pub struct HeaderPrefixes {
    pub header: String,
    pub metadata: String,
}

impl HeaderPrefixes {
    pub fn from_provider(provider: &Provider) -> Self {
        Self {
            header: provider.header_prefix.clone(),
            metadata: provider.metadata_prefix.clone(),
        }
    }
}

/// Response headers split by provider prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub headers: BTreeMap<String, String>,
    /// Provider headers with the header prefix stripped
    pub cloud_headers: BTreeMap<String, String>,
    /// User metadata with the metadata prefix stripped
    pub metadata: BTreeMap<String, String>,
}

impl ResponseMeta {
    /// Split headers, longest prefix first: metadata, cloud headers, rest
    pub fn split(raw: &HeaderMap, prefixes: &HeaderPrefixes) -> Self {
        let mut meta = ResponseMeta::default();
        for name in raw.keys() {
            let key = name.as_str().to_lowercase();
            let value = raw
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");

            if let Some(stripped) = key.strip_prefix(prefixes.metadata.as_str()) {
                meta.metadata.insert(stripped.to_string(), value);
            } else if let Some(stripped) = key.strip_prefix(prefixes.header.as_str()) {
                meta.cloud_headers.insert(stripped.to_string(), value);
            } else {
                meta.headers.insert(key, value);
            }
        }
        meta
    }
}
