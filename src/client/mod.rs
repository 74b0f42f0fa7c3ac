//! Container and blob operations
//!
//! A thin layer over the request engine: each operation builds a path and
//! query, picks a body step and shapes the result. Containers are addressed
//! virtual-host style through the `Host` header.

pub mod types;

pub use types::{BlobEntry, BlobListing, BlobStatus, ContainerEntry, ContainerStatus, ListOptions};

use http::Method;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tracing::info;

use crate::auth::SigningContext;
use crate::error::{Error, Result, TransportError};
use crate::request::{
    BodyProcessor, Buffered, HyperTransport, RawRequest, Request, RequestOptions, ResponseMeta, Structured,
    Transport, XmlNode, XmlParser,
};
use crate::stream::{DownloadStream, DownloadToFile, UploadFromFile, UploadStream};

/// Operations against one account
#[derive(Clone)]
pub struct Client {
    ctx: SigningContext,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client over the hyper transport, with the context's timeout applied
    /// to response headers
    pub fn new(ctx: SigningContext) -> Result<Self> {
        let transport = HyperTransport::new()?.with_timeout(ctx.timeout());
        Ok(Self::with_transport(ctx, Arc::new(transport)))
    }

    pub fn with_transport(ctx: SigningContext, transport: Arc<dyn Transport>) -> Self {
        Self { ctx, transport }
    }

    pub fn context(&self) -> &SigningContext {
        &self.ctx
    }

    /// Sign a request, addressed to `container` when one is given
    pub fn raw_request(&self, container: Option<&str>, mut options: RequestOptions) -> Result<RawRequest> {
        if let Some(name) = container {
            if name.is_empty() {
                return Err(Error::usage("No container name."));
            }
            if !options.headers.keys().any(|k| k.eq_ignore_ascii_case("host")) {
                options.headers.insert("host".to_string(), self.ctx.auth_host(Some(name)));
            }
        }
        RawRequest::new(self.ctx.clone(), self.transport.clone(), &options)
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerEntry>> {
        let raw = self.raw_request(None, RequestOptions::new(Method::GET, "/"))?;
        let request = Request::new(raw, Structured(XmlParser))
            .map_results(|root, _| Ok(root.map(|root| containers(&root)).unwrap_or_default()));
        complete(request).await
    }

    /// Create a container. A container the caller already owns counts as
    /// created when the provider policy allows it.
    pub async fn create_container(&self, name: &str) -> Result<ContainerStatus> {
        let allow_owned = self.ctx.provider().policy.create_already_owned_is_success;
        let options = RequestOptions::new(Method::PUT, "/").header("content-length", 0);
        let raw = self.raw_request(Some(name), options)?;

        let status = ContainerStatus {
            name: name.to_string(),
            ..Default::default()
        };
        let created = status.clone();
        let request = Request::new(raw, Buffered)
            .map_results(move |_, _| Ok(created))
            .on_error(move |err, _| match err {
                Error::Cloud(e) if allow_owned && e.is_already_owned_by_you() => {
                    info!(container = %status.name, "Container already owned, create is a no-op");
                    Ok(ContainerStatus {
                        already_created: true,
                        ..status
                    })
                }
                other => Err(other),
            });
        complete(request).await
    }

    /// Check that a container exists and is accessible
    pub async fn validate_container(&self, name: &str) -> Result<()> {
        let options = RequestOptions::new(Method::GET, "/").param("max-keys", 0);
        let raw = self.raw_request(Some(name), options)?;
        let request = Request::new(raw, Buffered).map_results(|_, _| Ok(()));
        complete(request).await
    }

    /// Delete a container. A missing or invalidly named container is a
    /// successful delete with `not_found` set when the policy allows it.
    pub async fn delete_container(&self, name: &str) -> Result<ContainerStatus> {
        let allow_missing = self.ctx.provider().policy.delete_missing_is_success;
        let raw = self.raw_request(Some(name), RequestOptions::new(Method::DELETE, "/"))?;

        let status = ContainerStatus {
            name: name.to_string(),
            ..Default::default()
        };
        let deleted = status.clone();
        let request = Request::new(raw, Buffered)
            .map_results(move |_, _| Ok(deleted))
            .on_error(move |err, _| match err {
                Error::Cloud(e) if allow_missing && (e.is_not_found() || e.is_invalid_name()) => {
                    info!(container = %status.name, "Container not found, delete is a no-op");
                    Ok(ContainerStatus { not_found: true, ..status })
                }
                other => Err(other),
            });
        complete(request).await
    }

    pub async fn list_blobs(&self, container: &str, list: &ListOptions) -> Result<BlobListing> {
        let mut options = RequestOptions::new(Method::GET, "/").param("max-keys", list.max_results);
        for (key, value) in [("prefix", &list.prefix), ("delimiter", &list.delimiter), ("marker", &list.marker)] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                options = options.param(key, value);
            }
        }

        let raw = self.raw_request(Some(container), options)?;
        let request = Request::new(raw, Structured(XmlParser))
            .map_results(|root, _| Ok(root.map(|root| BlobListing::from_node(&root)).unwrap_or_default()));
        complete(request).await
    }

    /// Blob properties and metadata
    pub async fn head_blob(&self, container: &str, name: &str) -> Result<ResponseMeta> {
        let raw = self.raw_request(Some(container), RequestOptions::new(Method::HEAD, &blob_path(name)?))?;
        let request = Request::new(raw, Buffered).map_results(|_, info| Ok(info.meta.clone()));
        complete(request).await
    }

    /// Delete a blob; a missing blob is a successful delete with
    /// `not_found` set when the policy allows it
    pub async fn delete_blob(&self, container: &str, name: &str) -> Result<BlobStatus> {
        let allow_missing = self.ctx.provider().policy.delete_missing_is_success;
        let raw = self.raw_request(Some(container), RequestOptions::new(Method::DELETE, &blob_path(name)?))?;

        let status = BlobStatus {
            name: name.to_string(),
            not_found: false,
        };
        let deleted = status.clone();
        let request = Request::new(raw, Buffered)
            .map_results(move |_, _| Ok(deleted))
            .on_error(move |err, _| match err {
                Error::Cloud(e) if allow_missing && e.is_not_found() => {
                    info!(blob = %status.name, "Blob not found, delete is a no-op");
                    Ok(BlobStatus { not_found: true, ..status })
                }
                other => Err(other),
            });
        complete(request).await
    }

    /// Download stream for a blob; call `end()` to send
    pub fn get_blob(&self, container: &str, name: &str, extra: &RequestOptions) -> Result<DownloadStream> {
        let options = RequestOptions::new(Method::GET, &blob_path(name)?).merged(extra);
        Ok(DownloadStream::new(self.raw_request(Some(container), options)?))
    }

    /// Upload stream for a blob; write, then `end()` to send
    pub fn put_blob(&self, container: &str, name: &str, extra: &RequestOptions) -> Result<UploadStream> {
        let options = RequestOptions::new(Method::PUT, &blob_path(name)?).merged(extra);
        Ok(UploadStream::new(self.raw_request(Some(container), options)?))
    }

    pub fn get_blob_to_file(
        &self,
        container: &str,
        name: &str,
        path: impl AsRef<Path>,
        extra: &RequestOptions,
    ) -> Result<DownloadToFile<File>> {
        Ok(DownloadToFile::to_path(self.get_blob(container, name, extra)?, path))
    }

    pub fn put_blob_from_file(
        &self,
        container: &str,
        name: &str,
        path: impl AsRef<Path>,
        extra: &RequestOptions,
    ) -> Result<UploadFromFile<File>> {
        Ok(UploadFromFile::from_path(self.put_blob(container, name, extra)?, path))
    }
}

/// Percent-encode a blob name, keeping `/` separators
fn blob_path(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::usage("No blob name."));
    }
    let encoded: Vec<_> = name.split('/').map(urlencoding::encode).collect();
    Ok(format!("/{}", encoded.join("/")))
}

fn containers(root: &XmlNode) -> Vec<ContainerEntry> {
    root.child("Buckets")
        .map(|b| b.children_named("Bucket").filter_map(ContainerEntry::from_node).collect())
        .unwrap_or_default()
}

async fn complete<P: BodyProcessor + 'static, T>(mut request: Request<P, T>) -> Result<T> {
    match request.end().await {
        Some(outcome) => outcome.map(|completion| completion.result),
        None => Err(TransportError::Closed.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path_encoding() {
        assert_eq!(blob_path("a b/c+d.txt").unwrap(), "/a%20b/c%2Bd.txt");
        assert_eq!(blob_path("plain").unwrap(), "/plain");
        assert!(matches!(blob_path(""), Err(Error::Usage(_))));
    }

    #[test]
    fn test_containers_from_xml() {
        use crate::request::ResponseParser;
        let root = XmlParser
            .parse(b"<ListAllMyBucketsResult><Buckets><Bucket><Name>a</Name></Bucket></Buckets></ListAllMyBucketsResult>")
            .unwrap();
        let entries = containers(&root);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].created, None);
    }
}
