//! File-backed main-session storage.
//!
//! # File Format
//!
//! ```json
//! {
//!   "mainSessions": [
//!     { "startTimestamp": 1700000000000, "endTimestamp": null, "tabSessions": [] }
//!   ]
//! }
//! ```
//!
//! # Defensive Reads
//!
//! - Missing file → empty collection
//! - Empty file → empty collection
//! - Corrupt JSON → empty collection, logged; before the next write the
//!   corrupt file is moved aside to `<name>.corrupt` so it is not silently lost
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write leaves the previous document.

use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{Result, TrackerError};
use crate::model::MainSession;

use super::SessionGateway;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    main_sessions: Vec<MainSession>,
}

enum Loaded {
    Document(StoreDocument),
    Corrupt,
}

pub struct JsonFileGateway {
    path: PathBuf,
}

impl JsonFileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileGateway { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Loaded> {
        if !self.path.exists() {
            return Ok(Loaded::Document(StoreDocument::default()));
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|err| TrackerError::io("Failed to read session store", err))?;

        if content.trim().is_empty() {
            warn!(path = %self.path.display(), "Empty session store, treating as no sessions");
            return Ok(Loaded::Document(StoreDocument::default()));
        }

        match serde_json::from_str::<StoreDocument>(&content) {
            Ok(document) => Ok(Loaded::Document(document)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Failed to parse session store, treating as no sessions"
                );
                Ok(Loaded::Corrupt)
            }
        }
    }

    /// Loads for a read-modify-write. A corrupt file is moved aside first.
    fn load_for_write(&self) -> Result<StoreDocument> {
        match self.load()? {
            Loaded::Document(document) => Ok(document),
            Loaded::Corrupt => {
                let backup = self.corrupt_backup_path();
                fs::rename(&self.path, &backup)
                    .map_err(|err| TrackerError::io("Failed to move corrupt store aside", err))?;
                warn!(backup = %backup.display(), "Moved corrupt session store aside");
                Ok(StoreDocument::default())
            }
        }
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "sessions.json".into());
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    fn save(&self, document: &StoreDocument) -> Result<()> {
        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent_dir)
            .map_err(|err| TrackerError::io("Failed to create store directory", err))?;

        let content = serde_json::to_string_pretty(document)
            .map_err(|err| TrackerError::json("Failed to serialize session store", err))?;

        let mut temp_file = NamedTempFile::new_in(&parent_dir)
            .map_err(|err| TrackerError::io("Failed to create temp store file", err))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| TrackerError::io("Failed to write temp store file", err))?;
        temp_file
            .flush()
            .map_err(|err| TrackerError::io("Failed to flush temp store file", err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| TrackerError::io("Failed to replace session store", err.error))?;

        Ok(())
    }
}

impl SessionGateway for JsonFileGateway {
    fn append(&mut self, session: &MainSession) -> Result<()> {
        let mut document = self.load_for_write()?;
        document.main_sessions.push(session.clone());
        self.save(&document)
    }

    fn replace_last(&mut self, session: &MainSession) -> Result<()> {
        let mut document = self.load_for_write()?;
        let last = document
            .main_sessions
            .last_mut()
            .ok_or(TrackerError::EmptyCollection)?;
        *last = session.clone();
        self.save(&document)
    }

    fn read_all(&self) -> Result<Vec<MainSession>> {
        match self.load()? {
            Loaded::Document(document) => Ok(document.main_sessions),
            Loaded::Corrupt => Ok(Vec::new()),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.save(&StoreDocument::default())
    }
}
