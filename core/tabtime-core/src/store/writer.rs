//! Background storage writer.
//!
//! Owns the gateway on a dedicated thread so the event loop never waits on
//! disk. Writes are applied strictly in submission order; a failed write is
//! logged and the next one proceeds (each write is a full overwrite of the
//! current record, so a later success supersedes an earlier failure).

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Result, TrackerError};

use super::{apply_logged, SessionGateway, SessionSink, WriteOp};

pub struct StorageWriter {
    sender: Option<Sender<WriteOp>>,
    handle: Option<JoinHandle<()>>,
}

impl StorageWriter {
    pub fn spawn<G>(mut gateway: G) -> Result<Self>
    where
        G: SessionGateway + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<WriteOp>();
        let handle = thread::Builder::new()
            .name("tabtime-storage".to_string())
            .spawn(move || {
                for op in receiver {
                    apply_logged(&mut gateway, &op);
                }
                debug!("Storage writer drained");
            })
            .map_err(|err| TrackerError::io("Failed to spawn storage writer", err))?;

        Ok(StorageWriter {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Stops accepting writes, applies everything already queued, and joins
    /// the writer thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        drop(self.sender.take());
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| TrackerError::WriterPanicked),
            None => Ok(()),
        }
    }
}

impl SessionSink for StorageWriter {
    fn submit(&mut self, op: WriteOp) {
        let Some(sender) = self.sender.as_ref() else {
            warn!("Storage writer already shut down; dropping write");
            return;
        };
        if sender.send(op).is_err() {
            warn!("Storage writer thread is gone; dropping write");
        }
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(error = %err, "Storage writer did not shut down cleanly");
        }
    }
}
