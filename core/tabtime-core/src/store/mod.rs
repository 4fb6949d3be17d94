//! Persistence gateway for main-session records.
//!
//! The durable state is one ordered collection of [`MainSession`]s, oldest
//! first. The controller only ever appends a new record or overwrites the
//! last one, so a whole-document read-modify-write is enough as long as there
//! is a single writer.
//!
//! # Module Structure
//!
//! - [`file`]: JSON document on disk, written atomically
//! - [`memory`]: shared in-memory collection for tests and dry runs
//! - [`writer`]: background thread that applies writes fire-and-forget
//!
//! The controller never talks to a gateway directly. It submits
//! [`WriteOp`]s to a [`SessionSink`]; failures are logged by the sink and
//! dropped, and the controller's in-memory state stays authoritative.

mod file;
mod memory;
mod writer;

pub use file::JsonFileGateway;
pub use memory::MemoryGateway;
pub use writer::StorageWriter;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::MainSession;

/// Durable storage of the main-session collection.
pub trait SessionGateway {
    /// Adds a record at the end of the collection.
    fn append(&mut self, session: &MainSession) -> Result<()>;

    /// Overwrites the most recent record. Fails with
    /// [`TrackerError::EmptyCollection`](crate::TrackerError::EmptyCollection)
    /// when nothing is stored.
    fn replace_last(&mut self, session: &MainSession) -> Result<()>;

    /// All records in storage order, oldest first.
    fn read_all(&self) -> Result<Vec<MainSession>>;

    fn read_last(&self) -> Result<Option<MainSession>> {
        Ok(self.read_all()?.pop())
    }

    fn clear(&mut self) -> Result<()>;
}

/// A mirrored mutation of the current main session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Append(MainSession),
    ReplaceLast(MainSession),
}

impl WriteOp {
    pub fn apply<G: SessionGateway + ?Sized>(&self, gateway: &mut G) -> Result<()> {
        match self {
            WriteOp::Append(session) => gateway.append(session),
            WriteOp::ReplaceLast(session) => gateway.replace_last(session),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WriteOp::Append(_) => "append",
            WriteOp::ReplaceLast(_) => "replace_last",
        }
    }
}

/// Where the controller sends its writes. Submitting never fails; errors are
/// the sink's to log.
pub trait SessionSink {
    fn submit(&mut self, op: WriteOp);
}

/// Applies writes inline. Used by tests and one-shot commands.
pub struct DirectSink<G: SessionGateway> {
    gateway: G,
}

impl<G: SessionGateway> DirectSink<G> {
    pub fn new(gateway: G) -> Self {
        DirectSink { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_inner(self) -> G {
        self.gateway
    }
}

impl<G: SessionGateway> SessionSink for DirectSink<G> {
    fn submit(&mut self, op: WriteOp) {
        apply_logged(&mut self.gateway, &op);
    }
}

pub(crate) fn apply_logged<G: SessionGateway + ?Sized>(gateway: &mut G, op: &WriteOp) {
    match op.apply(gateway) {
        Ok(()) => debug!(op = op.label(), "Session write applied"),
        Err(err) => warn!(op = op.label(), error = %err, "Session write dropped"),
    }
}
