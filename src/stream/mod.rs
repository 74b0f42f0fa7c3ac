//! Stream adapters
//!
//! Downloads and uploads built on the request lifecycle, plus helpers that
//! pipe them to and from local files.

pub mod control;
pub mod download;
pub mod transfer;
pub mod upload;

pub use control::{Control, StreamHandle, StreamState, Teardown};
pub use download::{DownloadStream, StreamEvent};
pub use transfer::{DownloadToFile, UploadFromFile};
pub use upload::UploadStream;

use bytes::Bytes;
use tokio::sync::watch;

use crate::error::Result;
use crate::request::BodyProcessor;

/// Body step for streams: buffered bytes only ever feed error messages
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Discard;

impl BodyProcessor for Discard {
    type Output = ();

    fn process(&self, _body: Bytes) -> Result<()> {
        Ok(())
    }
}

/// Resolves once `done` holds for the current control value
async fn torn_down(rx: &mut watch::Receiver<Control>, done: impl FnMut(&Control) -> bool) {
    let _ = rx.wait_for(done).await;
}
