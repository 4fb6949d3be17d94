//! # tabtime-core
//!
//! Per-site browsing time tracking: the session model, the lifecycle
//! controller that drives it from browser activity, the persistence gateway,
//! and the statistics the popup and dashboard render.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Browser lookups are explicit
//!   request/reply messages; storage writes go to a background thread.
//! - **Single writer**: Only the controller (through its sink) mutates the
//!   store. Presentation reads the whole collection and never writes.
//! - **Graceful degradation**: Lookup misses, unparseable URLs, and storage
//!   failures cost at most a slice of untracked time, never the loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabtime_core::{Controller, JsonFileGateway};
//!
//! let gateway = JsonFileGateway::new("/tmp/sessions.json");
//! let (mut controller, _recovered) = Controller::bootstrap(gateway, now_ms)?;
//! if let Some(lookup) = controller.handle(message) {
//!     // forward lookup to the extension
//! }
//! ```

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod model;
pub mod recovery;
pub mod stats;
pub mod store;

pub use config::{load_config, TrackerConfig};
pub use controller::{Controller, ControllerState, Lookup};
pub use domain::domain_from_url;
pub use error::{Result, TrackerError};
pub use model::{MainSession, TabSession};
pub use recovery::{recover_unclean_shutdown, RecoveryReport};
pub use stats::{DailyAverageMode, DashboardStats, DomainTime, PopupStats};
pub use store::{
    DirectSink, JsonFileGateway, MemoryGateway, SessionGateway, SessionSink, StorageWriter,
    WriteOp,
};
