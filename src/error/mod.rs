//! Error types for the request engine
//!
//! Three families of failure reach callers:
//! - usage errors, returned synchronously from constructors
//! - transport and local I/O errors, passed through untouched
//! - cloud errors, always routed through the provider's [`ErrorTranslator`]

pub mod translator;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use translator::{ErrorRule, ErrorTranslator, MethodOverride, RecodePolicy};

/// Named classification attached to a [`CloudError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    NotFound,
    NotEmpty,
    InvalidName,
    NotOwner,
    AlreadyOwnedByYou,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NotEmpty => "NOT_EMPTY",
            ErrorKind::InvalidName => "INVALID_NAME",
            ErrorKind::NotOwner => "NOT_OWNER",
            ErrorKind::AlreadyOwnedByYou => "ALREADY_OWNED_BY_YOU",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of error kinds; several may apply to one error at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSet(BTreeSet<ErrorKind>);

impl KindSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn of(kinds: &[ErrorKind]) -> Self {
        Self(kinds.iter().copied().collect())
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: ErrorKind) {
        self.0.insert(kind);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ErrorKind> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(ErrorKind::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Snapshot of a failed response, kept for inspection by callers
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Error reported by the storage provider
#[derive(Debug, Clone)]
pub struct CloudError {
    message: String,
    status: Option<u16>,
    kinds: KindSet,
    code: Option<String>,
    response: Option<Arc<ResponseSnapshot>>,
    /// The untranslated error this one was produced from
    raw: Option<Box<CloudError>>,
}

impl CloudError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            kinds: KindSet::empty(),
            code: None,
            response: None,
            raw: None,
        }
    }

    /// Build an untranslated error from a failed response body.
    ///
    /// The message is the lossy UTF-8 decode of the whole body and the
    /// provider code is read from `<Error><Code>` when present.
    pub fn from_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let message = body_to_string(&body);
        let code = translator::extract_error_code(&body);
        Self {
            message,
            status: Some(status.as_u16()),
            kinds: KindSet::empty(),
            code,
            response: Some(Arc::new(ResponseSnapshot { status, headers, body })),
            raw: None,
        }
    }

    pub fn with_kinds(mut self, kinds: KindSet) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn translated(message: &str, kinds: KindSet, raw: CloudError) -> Self {
        Self {
            message: message.to_string(),
            status: raw.status,
            kinds,
            code: raw.code.clone(),
            response: raw.response.clone(),
            raw: Some(Box::new(raw)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn kinds(&self) -> &KindSet {
        &self.kinds
    }

    /// Provider error code, e.g. `NoSuchKey`
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn response(&self) -> Option<&ResponseSnapshot> {
        self.response.as_deref()
    }

    pub fn raw(&self) -> Option<&CloudError> {
        self.raw.as_deref()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn is_not_found(&self) -> bool {
        self.is(ErrorKind::NotFound)
    }

    pub fn is_not_empty(&self) -> bool {
        self.is(ErrorKind::NotEmpty)
    }

    pub fn is_invalid_name(&self) -> bool {
        self.is(ErrorKind::InvalidName)
    }

    pub fn is_not_owner(&self) -> bool {
        self.is(ErrorKind::NotOwner)
    }

    pub fn is_already_owned_by_you(&self) -> bool {
        self.is(ErrorKind::AlreadyOwnedByYou)
    }
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "cloud error ({}): {}", status, self.message)?,
            None => write!(f, "cloud error: {}", self.message)?,
        }
        if !self.kinds.is_empty() {
            write!(f, " {}", self.kinds)?;
        }
        Ok(())
    }
}

impl std::error::Error for CloudError {}

/// Decode buffered body chunks into one string.
///
/// Invalid UTF-8 sequences are replaced rather than rejected: the result is
/// only ever used as an error message.
pub fn body_to_string(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// Decode a sequence of chunks and concatenate them
pub fn chunks_to_string<B: AsRef<[u8]>>(chunks: &[B]) -> String {
    chunks
        .iter()
        .map(|chunk| String::from_utf8_lossy(chunk.as_ref()))
        .collect()
}

/// Failures below the HTTP layer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request build error: {0}")]
    Build(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Body error: {0}")]
    Body(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Connection closed")]
    Closed,
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn as_cloud(&self) -> Option<&CloudError> {
        match self {
            Error::Cloud(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.as_cloud().is_some_and(CloudError::is_not_found)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Parse(format!("XML parse error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
