//! Request lifecycle state machine
//!
//! One [`Lifecycle`] tracks one exchange:
//!
//! ```text
//! Created -> Sent -> AwaitingHeaders -> CollectingBody -> Ended | Errored
//!                                    \-> Ended (200 with zero length, 204)
//! ```
//!
//! Transitions only move forward. The methods that can finish the exchange
//! return `Some(Terminal)` at most once over the life of the value; every
//! event that arrives after that is ignored.

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method, StatusCode};
use tracing::debug;

use super::body::BodyProcessor;
use super::meta::{HeaderPrefixes, ResponseMeta};
use crate::error::{CloudError, Error, ErrorTranslator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Created,
    Sent,
    AwaitingHeaders,
    CollectingBody,
    Ended,
    Errored,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ended | LifecycleState::Errored)
    }
}

/// Status and split headers of a received response
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub status: StatusCode,
    pub meta: ResponseMeta,
}

/// The single outcome of an exchange
#[derive(Debug)]
pub enum Terminal<O> {
    /// `body` is `None` for short-circuited or empty responses
    Success { body: Option<O>, info: ResponseInfo },
    Failure { error: Error, info: Option<ResponseInfo> },
}

/// Whether a response head finishes the exchange without reading a body
pub fn is_short_circuit(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::OK => headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0"),
        StatusCode::NO_CONTENT => true,
        _ => false,
    }
}

pub struct Lifecycle<P> {
    state: LifecycleState,
    method: Method,
    processor: P,
    translator: ErrorTranslator,
    prefixes: HeaderPrefixes,
    buf: BytesMut,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl<P: BodyProcessor> Lifecycle<P> {
    pub fn new(method: Method, processor: P, translator: ErrorTranslator, prefixes: HeaderPrefixes) -> Self {
        Self {
            state: LifecycleState::Created,
            method,
            processor,
            translator,
            prefixes,
            buf: BytesMut::new(),
            status: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Claim the right to send. Only the first call returns `true`.
    pub fn begin_send(&mut self) -> bool {
        self.advance(LifecycleState::Created, LifecycleState::Sent)
    }

    /// The request has been written and the response head is pending
    pub fn sent(&mut self) {
        self.advance(LifecycleState::Sent, LifecycleState::AwaitingHeaders);
    }

    pub fn on_headers(&mut self, status: StatusCode, headers: &HeaderMap) -> Option<Terminal<P::Output>> {
        if self.state != LifecycleState::AwaitingHeaders {
            return None;
        }
        self.status = Some(status);
        self.headers = headers.clone();

        if is_short_circuit(status, headers) {
            debug!(status = %status, "Response has no body");
            self.state = LifecycleState::Ended;
            return Some(Terminal::Success { body: None, info: self.info(status) });
        }

        self.state = LifecycleState::CollectingBody;
        None
    }

    pub fn on_chunk(&mut self, chunk: &[u8]) {
        if self.state == LifecycleState::CollectingBody {
            self.buf.extend_from_slice(chunk);
        }
    }

    /// The body has been fully received
    pub fn on_complete(&mut self) -> Option<Terminal<P::Output>> {
        if self.state != LifecycleState::CollectingBody {
            return None;
        }
        let status = self.status.unwrap_or(StatusCode::OK);
        let body = std::mem::take(&mut self.buf).freeze();
        let info = self.info(status);

        if status == StatusCode::OK {
            if body.is_empty() {
                self.state = LifecycleState::Ended;
                return Some(Terminal::Success { body: None, info });
            }
            return Some(match self.processor.process(body) {
                Ok(output) => {
                    self.state = LifecycleState::Ended;
                    Terminal::Success { body: Some(output), info }
                }
                Err(error) => {
                    self.state = LifecycleState::Errored;
                    Terminal::Failure { error, info: Some(info) }
                }
            });
        }

        self.state = LifecycleState::Errored;
        let error = self.translate(status, body);
        Some(Terminal::Failure { error: Error::Cloud(error), info: Some(info) })
    }

    /// Transport or local failure; ignored once terminal
    pub fn on_error(&mut self, error: Error) -> Option<Terminal<P::Output>> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = LifecycleState::Errored;
        let info = self.status.map(|status| self.info(status));
        Some(Terminal::Failure { error, info })
    }

    fn translate(&self, status: StatusCode, body: Bytes) -> CloudError {
        let raw = CloudError::from_response(status, self.headers.clone(), body);
        self.translator.translate_or_raw(raw, &self.method)
    }

    fn info(&self, status: StatusCode) -> ResponseInfo {
        ResponseInfo {
            status,
            meta: ResponseMeta::split(&self.headers, &self.prefixes),
        }
    }

    fn advance(&mut self, from: LifecycleState, to: LifecycleState) -> bool {
        if self.state == from {
            self.state = to;
            true
        } else {
            false
        }
    }
}
