//! File transfer helpers
//!
//! Each helper pipes a stream adapter to or from a local byte sink/source.
//! The network leg and the local leg run concurrently, joined by a bounded
//! channel. The first failure on either side is the outcome and tears the
//! other side down; success needs both legs to finish.

use bytes::{Bytes, BytesMut};
use futures::future::{self, BoxFuture, FutureExt};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::download::{DownloadStream, StreamEvent};
use super::upload::UploadStream;
use crate::error::{Error, Result, TransportError};
use crate::request::ResponseInfo;

const CHANNEL_DEPTH: usize = 16;
const READ_CHUNK: usize = 64 * 1024;

type Opener<T> = BoxFuture<'static, std::io::Result<T>>;

/// GET into a local sink
pub struct DownloadToFile<W> {
    download: DownloadStream,
    sink: Option<Opener<W>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> DownloadToFile<W> {
    pub fn new(download: DownloadStream, sink: W) -> Self {
        Self {
            download,
            sink: Some(future::ready(Ok(sink)).boxed()),
        }
    }

    pub fn download(&self) -> &DownloadStream {
        &self.download
    }

    /// Start the transfer and wait until the body is written and the sink
    /// closed. Only the first call runs; later calls return `None`.
    pub async fn end(&mut self) -> Option<Result<ResponseInfo>> {
        let open = self.sink.take()?;
        self.download.end().await;

        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let network = pump_download(&mut self.download, tx);
        let local = write_sink(open, rx);

        let outcome = tokio::try_join!(network, local).map(|(info, ())| info);
        if outcome.is_err() {
            self.download.destroy();
        }
        debug!(ok = outcome.is_ok(), "Download to file finished");
        Some(outcome)
    }
}

impl DownloadToFile<File> {
    /// The file is created when the transfer starts; failure to create it
    /// is the transfer's outcome
    pub fn to_path(download: DownloadStream, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            download,
            sink: Some(async move { File::create(path).await }.boxed()),
        }
    }
}

/// PUT from a local source
pub struct UploadFromFile<R> {
    upload: UploadStream,
    source: Option<Opener<R>>,
}

impl<R: AsyncRead + Unpin + Send + 'static> UploadFromFile<R> {
    pub fn new(upload: UploadStream, source: R) -> Self {
        Self {
            upload,
            source: Some(future::ready(Ok(source)).boxed()),
        }
    }

    pub fn upload(&self) -> &UploadStream {
        &self.upload
    }

    /// Read the whole source, then send it. Only the first call runs;
    /// later calls return `None`.
    pub async fn end(&mut self) -> Option<Result<ResponseInfo>> {
        let open = self.source.take()?;

        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let local = read_source(open, tx);
        let network = pump_upload(&mut self.upload, rx);

        let outcome = tokio::try_join!(local, network).map(|((), info)| info);
        if outcome.is_err() {
            self.upload.destroy();
        }
        debug!(ok = outcome.is_ok(), "Upload from file finished");
        Some(outcome)
    }
}

impl UploadFromFile<File> {
    /// The file is opened when the transfer starts; a missing file is the
    /// transfer's outcome
    pub fn from_path(upload: UploadStream, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            upload,
            source: Some(async move { File::open(path).await }.boxed()),
        }
    }
}

async fn pump_download(download: &mut DownloadStream, tx: mpsc::Sender<Bytes>) -> Result<ResponseInfo> {
    loop {
        match download.next_event().await {
            Some(StreamEvent::Data(chunk)) => {
                tx.send(chunk).await.map_err(|_| TransportError::Closed)?;
            }
            Some(StreamEvent::End(info)) => return Ok(info),
            Some(StreamEvent::Error(e)) => return Err(e),
            None => return Err(TransportError::Closed.into()),
        }
    }
}

async fn write_sink<W: AsyncWrite + Unpin>(open: Opener<W>, mut rx: mpsc::Receiver<Bytes>) -> Result<()> {
    let mut sink = open.await?;
    while let Some(chunk) = rx.recv().await {
        sink.write_all(&chunk).await?;
    }
    sink.flush().await?;
    sink.shutdown().await?;
    Ok(())
}

async fn read_source<R: AsyncRead + Unpin>(open: Opener<R>, tx: mpsc::Sender<Bytes>) -> Result<()> {
    let mut source = open.await?;
    loop {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        if source.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        tx.send(buf.freeze()).await.map_err(|_| TransportError::Closed)?;
    }
}

async fn pump_upload(upload: &mut UploadStream, mut rx: mpsc::Receiver<Bytes>) -> Result<ResponseInfo> {
    while let Some(chunk) = rx.recv().await {
        if !upload.write(&chunk) {
            return Err(Error::Transport(TransportError::Closed));
        }
    }
    upload.end().await.unwrap_or_else(|| Err(TransportError::Closed.into()))
}
