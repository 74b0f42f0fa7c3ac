//! HTTP transport
//!
//! The engine only needs one operation from the network: send a fully
//! signed request and hand back the status, headers and a body stream.
//! [`HyperTransport`] is the production implementation; tests substitute a
//! scripted one.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyStream, Full};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;

/// Response body as a stream of chunks in arrival order.
///
/// Dropping the stream closes the underlying connection.
pub type ResponseBody = BoxStream<'static, Result<Bytes, TransportError>>;

/// A signed request ready to go on the wire
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub ssl: bool,
    /// Host to connect to; the `Host` header may name a virtual host on it
    pub host: String,
    pub port: u16,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireRequest {
    pub fn uri(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let default_port = if self.ssl { 443 } else { 80 };
        let mut uri = String::with_capacity(scheme.len() + self.host.len() + self.path.len() + 10);
        uri.push_str(scheme);
        uri.push_str("://");
        uri.push_str(&self.host);
        if self.port != default_port {
            uri.push(':');
            uri.push_str(&self.port.to_string());
        }
        if !self.path.starts_with('/') {
            uri.push('/');
        }
        uri.push_str(&self.path);
        uri
    }
}

/// Response head plus streaming body
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl std::fmt::Debug for WireResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// One request/response exchange over the network
pub trait Transport: Send + Sync {
    fn send(&self, request: WireRequest) -> BoxFuture<'static, Result<WireResponse, TransportError>>;
}

/// hyper-based transport
///
/// Idle connections are not kept: each exchange owns its connection and
/// dropping the response body closes it.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    /// Applied to the wait for response headers only
    timeout: Option<Duration>,
}

impl HyperTransport {
    pub fn new() -> Result<Self, TransportError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));

        let tls = TlsConnector::new()
            .map_err(|e| TransportError::Build(format!("TLS connector: {}", e)))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .set_host(true)
            .build(https);

        Ok(Self { client, timeout: None })
    }

    /// Set the response-header timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: WireRequest) -> BoxFuture<'static, Result<WireResponse, TransportError>> {
        let client = self.client.clone();
        let timeout = self.timeout;

        async move {
            let uri = request.uri();
            debug!(method = %request.method, uri = %uri, body_len = request.body.len(), "Sending request");

            let mut builder = Request::builder().method(request.method).uri(&uri);
            for (key, value) in request.headers.iter() {
                builder = builder.header(key, value);
            }
            let http_request = builder
                .body(Full::new(request.body))
                .map_err(|e| TransportError::Build(e.to_string()))?;

            let pending = client.request(http_request);
            let response = match timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| TransportError::Timeout(limit))?,
                None => pending.await,
            }
            .map_err(|e| TransportError::Request(e.to_string()))?;

            let (parts, incoming) = response.into_parts();
            let body = BodyStream::new(incoming)
                .filter_map(|frame| async move {
                    match frame {
                        Ok(frame) => frame.into_data().ok().map(Ok),
                        Err(e) => Some(Err(TransportError::Body(e.to_string()))),
                    }
                })
                .boxed();

            Ok(WireResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        }
        .boxed()
    }
}
