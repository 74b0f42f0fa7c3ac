//! Request engine
//!
//! This module provides:
//! - Outgoing header assembly and response header splitting
//! - The transport seam and its hyper implementation
//! - The per-exchange lifecycle state machine
//! - Raw, buffered and structured request variants

pub mod body;
pub mod exchange;
pub mod lifecycle;
pub mod meta;
pub mod transport;

pub use body::{BodyProcessor, Buffered, ResponseParser, Structured, XmlNode, XmlParser};
pub use exchange::{drive, BufferedRequest, Completion, RawRequest, Request, StructuredRequest};
pub use lifecycle::{Lifecycle, LifecycleState, ResponseInfo, Terminal};
pub use meta::{HeaderPrefixes, RequestOptions, ResponseMeta};
pub use transport::{HyperTransport, ResponseBody, Transport, WireRequest, WireResponse};
