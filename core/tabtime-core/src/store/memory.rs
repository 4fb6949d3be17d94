use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, TrackerError};
use crate::model::MainSession;

use super::SessionGateway;

/// In-memory gateway. Clones share the same collection, so a test can hand
/// one clone to the controller and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    sessions: Arc<Mutex<Vec<MainSession>>>,
}

impl MemoryGateway {
    pub fn with_sessions(sessions: Vec<MainSession>) -> Self {
        MemoryGateway {
            sessions: Arc::new(Mutex::new(sessions)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MainSession>> {
        // A panicking writer cannot leave the Vec half-updated.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionGateway for MemoryGateway {
    fn append(&mut self, session: &MainSession) -> Result<()> {
        self.lock().push(session.clone());
        Ok(())
    }

    fn replace_last(&mut self, session: &MainSession) -> Result<()> {
        let mut sessions = self.lock();
        let last = sessions.last_mut().ok_or(TrackerError::EmptyCollection)?;
        *last = session.clone();
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<MainSession>> {
        Ok(self.lock().clone())
    }

    fn clear(&mut self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}
