//! Signed exchanges
//!
//! [`RawRequest`] is the header-level building block: it is signed once at
//! construction and can be dispatched once. [`Request`] drives a
//! [`Lifecycle`] over a raw request and turns its single terminal outcome
//! into a caller-shaped result.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use http::header::{HeaderName, HeaderValue, HOST};
use http::{HeaderMap, Method};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::body::{BodyProcessor, Buffered, Structured, XmlParser};
use super::lifecycle::{Lifecycle, ResponseInfo, Terminal};
use super::meta::{HeaderPrefixes, RequestOptions, ResponseMeta};
use super::transport::{Transport, WireRequest, WireResponse};
use crate::auth::{sign, SigningContext};
use crate::error::{Error, ErrorTranslator, Result, TransportError};

/// A signed request that has not been sent
#[derive(Clone)]
pub struct RawRequest {
    ctx: SigningContext,
    transport: Arc<dyn Transport>,
    method: Method,
    path: String,
    headers: HeaderMap,
}

impl RawRequest {
    /// Merge query parameters, assemble headers and sign.
    ///
    /// Invalid header names or values fail here, before anything is sent.
    pub fn new(ctx: SigningContext, transport: Arc<dyn Transport>, options: &RequestOptions) -> Result<Self> {
        let path = options.full_path();
        let headers = options.assemble_headers(ctx.provider())?;
        let headers = sign(&options.method, &path, &headers, &ctx)?;

        Ok(Self {
            ctx,
            transport,
            method: options.method.clone(),
            path,
            headers,
        })
    }

    /// Set a header that is not covered by the signature (e.g. `content-length`)
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn context(&self) -> &SigningContext {
        &self.ctx
    }

    pub fn translator(&self) -> ErrorTranslator {
        self.ctx.provider().translator()
    }

    pub fn prefixes(&self) -> HeaderPrefixes {
        HeaderPrefixes::from_provider(self.ctx.provider())
    }

    /// Split response headers with this request's provider prefixes
    pub fn meta(&self, headers: &HeaderMap) -> ResponseMeta {
        ResponseMeta::split(headers, &self.prefixes())
    }

    /// Lifecycle for one exchange of this request
    pub fn lifecycle<P: BodyProcessor>(&self, processor: P) -> Lifecycle<P> {
        Lifecycle::new(self.method.clone(), processor, self.translator(), self.prefixes())
    }

    /// Put the request on the wire.
    ///
    /// The connection always goes to the authentication host; a virtual
    /// host only travels in the `Host` header.
    pub fn dispatch(&self, body: Bytes) -> BoxFuture<'static, std::result::Result<WireResponse, TransportError>> {
        let host = self.ctx.auth_host(None);
        let vhost = self.headers.get(HOST).and_then(|h| h.to_str().ok()).unwrap_or_default();

        debug!(method = %self.method, path = %self.path, host = %host, vhost = %vhost, "Dispatching request");

        self.transport.send(WireRequest {
            method: self.method.clone(),
            ssl: self.ctx.ssl(),
            host,
            port: self.ctx.port(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            body,
        })
    }
}

impl fmt::Debug for RawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Feed one dispatched exchange through a lifecycle until it terminates
pub async fn drive<P: BodyProcessor>(
    lifecycle: &mut Lifecycle<P>,
    pending: BoxFuture<'static, std::result::Result<WireResponse, TransportError>>,
) -> Option<Terminal<P::Output>> {
    let response = match pending.await {
        Ok(response) => response,
        Err(e) => return lifecycle.on_error(e.into()),
    };

    if let Some(terminal) = lifecycle.on_headers(response.status, &response.headers) {
        return Some(terminal);
    }

    let mut body = response.body;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => lifecycle.on_chunk(&chunk),
            Err(e) => return lifecycle.on_error(e.into()),
        }
    }
    lifecycle.on_complete()
}

type ResultsFn<O, T> = Box<dyn FnOnce(Option<O>, &ResponseInfo) -> Result<T> + Send>;
type ErrorFn<T> = Box<dyn FnOnce(Error, &Method) -> Result<T> + Send>;

/// Result of a finished request plus the response it came from.
///
/// `info` is `None` when the exchange failed before a response arrived and
/// an error handler turned the failure into a result.
#[derive(Debug)]
pub struct Completion<T> {
    pub result: T,
    pub info: Option<ResponseInfo>,
}

/// One exchange with a pluggable body step and result/error transforms
pub struct Request<P: BodyProcessor, T> {
    raw: RawRequest,
    body: Bytes,
    lifecycle: Lifecycle<P>,
    results_fn: Option<ResultsFn<P::Output, T>>,
    error_fn: Option<ErrorFn<T>>,
}

/// Accumulates the whole body and hands back its bytes
pub type BufferedRequest<T> = Request<Buffered, T>;

/// Accumulates the whole body and parses it as XML
pub type StructuredRequest<T> = Request<Structured<XmlParser>, T>;

impl<P: BodyProcessor + 'static> Request<P, Option<P::Output>> {
    pub fn new(raw: RawRequest, processor: P) -> Self {
        let lifecycle = raw.lifecycle(processor);
        Self {
            raw,
            body: Bytes::new(),
            lifecycle,
            results_fn: Some(Box::new(|body, _| Ok(body))),
            error_fn: None,
        }
    }
}

impl<P: BodyProcessor + 'static, T> Request<P, T> {
    /// Replace the result transform.
    ///
    /// Changing the result type drops any error handler, so call this
    /// before [`Request::on_error`].
    pub fn map_results<U, F>(self, f: F) -> Request<P, U>
    where
        F: FnOnce(Option<P::Output>, &ResponseInfo) -> Result<U> + Send + 'static,
    {
        Request {
            raw: self.raw,
            body: self.body,
            lifecycle: self.lifecycle,
            results_fn: Some(Box::new(f)),
            error_fn: None,
        }
    }

    /// Handle the terminal error; returning `Ok` recodes it into a result
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Error, &Method) -> Result<T> + Send + 'static,
    {
        self.error_fn = Some(Box::new(f));
        self
    }

    /// Request body sent on `end()`
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn raw(&self) -> &RawRequest {
        &self.raw
    }

    pub fn lifecycle(&self) -> &Lifecycle<P> {
        &self.lifecycle
    }

    /// Send the request and wait for its terminal outcome.
    ///
    /// Only the first call sends; later calls return `None`.
    pub async fn end(&mut self) -> Option<Result<Completion<T>>> {
        if !self.lifecycle.begin_send() {
            return None;
        }
        self.lifecycle.sent();
        let pending = self.raw.dispatch(self.body.clone());
        let terminal = drive(&mut self.lifecycle, pending).await?;
        Some(self.finish(terminal))
    }

    fn finish(&mut self, terminal: Terminal<P::Output>) -> Result<Completion<T>> {
        match terminal {
            Terminal::Success { body, info } => {
                let results_fn = self
                    .results_fn
                    .take()
                    .ok_or_else(|| Error::usage("Request results already taken"))?;
                let result = results_fn(body, &info)?;
                Ok(Completion { result, info: Some(info) })
            }
            Terminal::Failure { error, info } => match self.error_fn.take() {
                Some(error_fn) => {
                    let result = error_fn(error, self.lifecycle.method())?;
                    Ok(Completion { result, info })
                }
                None => Err(error),
            },
        }
    }
}
