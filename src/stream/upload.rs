//! Writable adapter over a PUT exchange

use bytes::BytesMut;
use http::header::{HeaderValue, CONTENT_LENGTH};
use tokio::sync::watch;
use tracing::debug;

use super::control::{Control, StreamHandle, StreamState, Teardown};
use super::{torn_down, Discard};
use crate::error::Result;
use crate::request::{drive, Lifecycle, RawRequest, ResponseInfo, Terminal};

/// Collects a body in memory and sends it in one exchange on `end`.
///
/// The transport has no chunked request bodies, so nothing goes on the wire
/// before [`UploadStream::end`].
pub struct UploadStream {
    raw: RawRequest,
    lifecycle: Lifecycle<Discard>,
    state: StreamState,
    buf: BytesMut,
    handle: StreamHandle,
    rx: watch::Receiver<Control>,
}

impl UploadStream {
    pub fn new(raw: RawRequest) -> Self {
        let lifecycle = raw.lifecycle(Discard);
        let (handle, rx) = StreamHandle::new();
        Self {
            raw,
            lifecycle,
            state: StreamState::Idle,
            buf: BytesMut::new(),
            handle,
            rx,
        }
    }

    pub fn writable(&self) -> bool {
        self.state == StreamState::Idle && !self.handle.is_destroyed()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Bytes buffered so far
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append to the body. Returns the writable state; data written while
    /// not writable is dropped.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> bool {
        if !self.writable() {
            return false;
        }
        self.buf.extend_from_slice(data.as_ref());
        true
    }

    /// Append a final value, then [`UploadStream::end`]
    pub async fn end_with(&mut self, data: impl AsRef<[u8]>) -> Option<Result<ResponseInfo>> {
        self.write(data);
        self.end().await
    }

    /// Send the buffered body and wait for the outcome.
    ///
    /// Only the first call sends; later calls, and calls after `destroy`,
    /// return `None`. When `destroy_soon` was requested before this call the
    /// outcome is still returned and the stream is destroyed right after.
    pub async fn end(&mut self) -> Option<Result<ResponseInfo>> {
        let requested = self.handle.control().teardown;
        if !self.writable() || !self.lifecycle.begin_send() {
            return None;
        }
        self.lifecycle.sent();
        self.state = StreamState::Open;

        let body = std::mem::take(&mut self.buf).freeze();
        self.raw.set_header(CONTENT_LENGTH, HeaderValue::from(body.len()));
        debug!(path = %self.raw.path(), bytes = body.len(), "Uploading buffered body");

        // A destroy_soon issued after end() is an immediate destroy.
        let deferred = requested == Teardown::Soon;
        let pending = self.raw.dispatch(body);
        let terminal = {
            let rx = &mut self.rx;
            let lifecycle = &mut self.lifecycle;
            tokio::select! {
                biased;
                _ = torn_down(rx, move |c| match c.teardown {
                    Teardown::Now => true,
                    Teardown::Soon => !deferred,
                    Teardown::None => false,
                }) => None,
                terminal = drive(lifecycle, pending) => terminal,
            }
        };

        let Some(terminal) = terminal else {
            self.teardown();
            return None;
        };
        let outcome = match terminal {
            Terminal::Success { info, .. } => {
                self.state = StreamState::Ended;
                Ok(info)
            }
            Terminal::Failure { error, .. } => {
                self.state = StreamState::Errored;
                Err(error)
            }
        };
        if self.handle.control().teardown != Teardown::None {
            self.teardown();
        }
        Some(outcome)
    }

    /// Idempotent. Drops buffered data and any in-flight exchange.
    pub fn destroy(&mut self) {
        self.handle.destroy();
        self.teardown();
    }

    /// Destroys immediately once `end` has been called; otherwise the
    /// stream is destroyed after the exchange `end` starts has finished
    pub fn destroy_soon(&mut self) {
        self.handle.destroy_soon();
        if self.state != StreamState::Idle {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        if self.state == StreamState::Destroyed {
            return;
        }
        self.state = StreamState::Destroyed;
        self.buf.clear();
        debug!(path = %self.raw.path(), "Upload stream destroyed");
    }
}
