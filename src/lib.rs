//! s3bridge - unified client for S3-compatible object storage
//!
//! Requests are signed once when built, driven through a single-outcome
//! lifecycle, and exposed either as whole results or as upload/download
//! streams. Provider differences (header prefixes, signature tag, error
//! table) live in [`auth::Provider`] values.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod stream;

pub use auth::{Provider, SigningContext};
pub use client::Client;
pub use config::Config;
pub use error::{CloudError, Error, ErrorKind, Result};
pub use request::RequestOptions;
pub use stream::{DownloadStream, StreamEvent, StreamHandle, UploadStream};
