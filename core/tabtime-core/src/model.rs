//! Main and tab session records.
//!
//! Pure data plus lifecycle operations; no I/O. Field names serialize as
//! camelCase so the stored document stays readable by the extension shim.
//!
//! Timestamps are epoch milliseconds. An end timestamp, once set, never goes
//! back to `None`, and is never earlier than the start.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Continuous attention to one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSession {
    domain: String,
    start_timestamp: i64,
    #[serde(default)]
    end_timestamp: Option<i64>,
}

impl TabSession {
    pub fn start(domain: impl Into<String>, at: i64) -> Self {
        TabSession {
            domain: domain.into(),
            start_timestamp: at,
            end_timestamp: None,
        }
    }

    /// Ends the session. Returns `false` (and changes nothing) if it had
    /// already ended.
    pub fn end(&mut self, at: i64) -> bool {
        if self.end_timestamp.is_some() {
            return false;
        }
        self.end_timestamp = Some(at.max(self.start_timestamp));
        true
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn start_timestamp(&self) -> i64 {
        self.start_timestamp
    }

    pub fn end_timestamp(&self) -> Option<i64> {
        self.end_timestamp
    }

    pub fn is_open(&self) -> bool {
        self.end_timestamp.is_none()
    }

    /// Whole seconds between start and end, floored; 0 while open.
    pub fn duration_secs(&self) -> u64 {
        span_secs(self.start_timestamp, self.end_timestamp)
    }
}

/// One continuous period during which some browser window held focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainSession {
    start_timestamp: i64,
    #[serde(default)]
    end_timestamp: Option<i64>,
    #[serde(default)]
    tab_sessions: Vec<TabSession>,
}

impl MainSession {
    pub fn start(at: i64) -> Self {
        MainSession {
            start_timestamp: at,
            end_timestamp: None,
            tab_sessions: Vec::new(),
        }
    }

    /// Ends the session. Returns `false` if it had already ended.
    pub fn end(&mut self, at: i64) -> bool {
        if self.end_timestamp.is_some() {
            return false;
        }
        self.end_timestamp = Some(at.max(self.start_timestamp));
        true
    }

    /// Appends a tab session in chronological order.
    ///
    /// Rejected when the sequence already holds an open tab session, since
    /// that entry must remain the last one.
    pub fn add_tab_session(&mut self, tab_session: TabSession) -> Result<()> {
        if let Some(open) = self.tab_sessions.iter().find(|tab| tab.is_open()) {
            return Err(TrackerError::OpenTabSessionNotLast {
                domain: open.domain.clone(),
            });
        }
        self.tab_sessions.push(tab_session);
        Ok(())
    }

    pub fn start_timestamp(&self) -> i64 {
        self.start_timestamp
    }

    pub fn end_timestamp(&self) -> Option<i64> {
        self.end_timestamp
    }

    pub fn is_open(&self) -> bool {
        self.end_timestamp.is_none()
    }

    pub fn tab_sessions(&self) -> &[TabSession] {
        &self.tab_sessions
    }

    pub fn duration_secs(&self) -> u64 {
        span_secs(self.start_timestamp, self.end_timestamp)
    }

    /// Latest end timestamp among closed tab sessions.
    pub fn latest_tab_end(&self) -> Option<i64> {
        self.tab_sessions
            .iter()
            .filter_map(TabSession::end_timestamp)
            .max()
    }

    /// Closes any tab session still open, clamping to its own start.
    /// Returns how many were closed.
    pub(crate) fn close_open_tabs(&mut self, at: i64) -> usize {
        self.tab_sessions
            .iter_mut()
            .filter(|tab| tab.is_open())
            .map(|tab| tab.end(at))
            .filter(|changed| *changed)
            .count()
    }
}

fn span_secs(start: i64, end: Option<i64>) -> u64 {
    match end {
        Some(end) => (end.saturating_sub(start).max(0) / 1000) as u64,
        None => 0,
    }
}
