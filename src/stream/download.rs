//! Readable adapter over a GET exchange

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use tokio::sync::watch;
use tracing::debug;

use super::control::{Control, StreamHandle, StreamState, Teardown};
use super::{torn_down, Discard};
use crate::error::{Error, Result, TransportError};
use crate::request::{Lifecycle, RawRequest, ResponseBody, ResponseInfo, Terminal};

/// What a download delivers, in order: any number of `Data`, then exactly
/// one of `End` or `Error`
#[derive(Debug)]
pub enum StreamEvent {
    Data(Bytes),
    End(ResponseInfo),
    Error(Error),
}

enum Step {
    Control,
    Closed,
    Chunk(Option<std::result::Result<Bytes, TransportError>>),
}

/// Streams a response body to the caller chunk by chunk.
///
/// Nothing is sent until [`DownloadStream::end`]. Bodies of error responses
/// are buffered for the error message and never delivered as data.
pub struct DownloadStream {
    raw: RawRequest,
    lifecycle: Lifecycle<Discard>,
    state: StreamState,
    status: Option<StatusCode>,
    body: Option<ResponseBody>,
    pending: Option<Terminal<()>>,
    consumer: bool,
    handle: StreamHandle,
    rx: watch::Receiver<Control>,
}

impl DownloadStream {
    pub fn new(raw: RawRequest) -> Self {
        let lifecycle = raw.lifecycle(Discard);
        let (handle, rx) = StreamHandle::new();
        Self {
            raw,
            lifecycle,
            state: StreamState::Idle,
            status: None,
            body: None,
            pending: None,
            consumer: true,
            handle,
            rx,
        }
    }

    pub fn readable(&self) -> bool {
        self.state.is_open() && !self.handle.is_destroyed()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Response status, once headers have arrived
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Send the request and wait for the response head.
    ///
    /// Idempotent. Does nothing once `destroy` or `destroy_soon` has been
    /// requested.
    pub async fn end(&mut self) {
        if self.state != StreamState::Idle || self.handle.control().teardown != Teardown::None {
            return;
        }
        if !self.lifecycle.begin_send() {
            return;
        }
        self.lifecycle.sent();
        self.state = StreamState::Open;

        let pending = self.raw.dispatch(Bytes::new());
        let response = {
            let rx = &mut self.rx;
            tokio::select! {
                biased;
                _ = torn_down(rx, |c| c.teardown == Teardown::Now) => None,
                response = pending => Some(response),
            }
        };

        match response {
            None => self.teardown(),
            Some(Ok(response)) => {
                self.status = Some(response.status);
                match self.lifecycle.on_headers(response.status, &response.headers) {
                    Some(terminal) => self.pending = Some(terminal),
                    None => self.body = Some(response.body),
                }
            }
            Some(Err(e)) => self.pending = self.lifecycle.on_error(e.into()),
        }
    }

    /// Next event, or `None` when the stream is finished, destroyed or was
    /// never started
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let control = *self.rx.borrow_and_update();
            if control.teardown == Teardown::Now {
                self.teardown();
                return None;
            }
            if self.state == StreamState::Destroyed {
                return None;
            }
            if let Some(terminal) = self.pending.take() {
                return Some(self.finish(terminal));
            }

            let step = {
                let body = self.body.as_mut()?;
                let rx = &mut self.rx;
                tokio::select! {
                    biased;
                    changed = rx.changed() => if changed.is_ok() { Step::Control } else { Step::Closed },
                    chunk = body.next(), if !control.paused => Step::Chunk(chunk),
                }
            };

            match step {
                Step::Control => continue,
                Step::Closed => {
                    self.teardown();
                    return None;
                }
                Step::Chunk(Some(Ok(chunk))) => {
                    if self.consumer && self.status == Some(StatusCode::OK) {
                        return Some(StreamEvent::Data(chunk));
                    }
                    self.lifecycle.on_chunk(&chunk);
                }
                Step::Chunk(Some(Err(e))) => {
                    self.body = None;
                    self.pending = self.lifecycle.on_error(e.into());
                }
                Step::Chunk(None) => {
                    self.body = None;
                    self.pending = self.lifecycle.on_complete();
                }
            }
        }
    }

    /// Read to the end without a data consumer and return the outcome
    pub async fn drain(&mut self) -> Result<ResponseInfo> {
        self.consumer = false;
        loop {
            match self.next_event().await {
                Some(StreamEvent::Data(_)) => continue,
                Some(StreamEvent::End(info)) => return Ok(info),
                Some(StreamEvent::Error(e)) => return Err(e),
                None => return Err(TransportError::Closed.into()),
            }
        }
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Idempotent. No events are delivered afterwards and the connection is
    /// closed.
    pub fn destroy(&mut self) {
        self.handle.destroy();
        self.teardown();
    }

    /// Destroy once the exchange reaches its terminal outcome
    pub fn destroy_soon(&mut self) {
        self.handle.destroy_soon();
        if matches!(self.state, StreamState::Ended | StreamState::Errored) {
            self.teardown();
        }
    }

    fn finish(&mut self, terminal: Terminal<()>) -> StreamEvent {
        let event = match terminal {
            Terminal::Success { info, .. } => {
                self.state = StreamState::Ended;
                StreamEvent::End(info)
            }
            Terminal::Failure { error, .. } => {
                self.state = StreamState::Errored;
                StreamEvent::Error(error)
            }
        };
        if self.handle.control().teardown == Teardown::Soon {
            self.teardown();
        }
        event
    }

    fn teardown(&mut self) {
        if self.state == StreamState::Destroyed {
            return;
        }
        self.state = StreamState::Destroyed;
        self.body = None;
        self.pending = None;
        debug!(path = %self.raw.path(), "Download stream destroyed");
    }
}
