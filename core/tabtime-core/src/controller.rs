//! Session lifecycle controller.
//!
//! Drives main and tab sessions from browser activity and mirrors every
//! mutation of the current main session to storage.
//!
//! ## State Machine
//!
//! ```text
//! startup                 → MainActiveNoTab   (recovery, then new main session)
//! tab_activated           → close open tab, look up tab → MainActiveTabOpen
//! tab_updated (complete)  → look up tab; if active in the focused window, supersede
//! window focus → window   → close open tab (or start main), look up active tab
//! window focus → none     → close open tab, end main → NoMainSession
//! window_removed          → count windows; at 0, end main → NoMainSession
//! ```
//!
//! ## Lookups
//!
//! The controller never calls the browser. A handler that needs tab data
//! returns a [`Lookup`] and the reply comes back later as its own event. Each
//! tab lookup remembers the tab generation it was issued under; any event
//! that eagerly changes the tab state bumps the generation, so replies that
//! arrive after being superseded are dropped instead of cancelled. A tab
//! reply recorded before the open tab session started (or before the last
//! closed one ended) is dropped too, so tab sessions stay in chronological
//! order however the replies interleave.
//!
//! Tab activations and completed navigations only count in the focused
//! window. Until the first focus event the window is unknown, and the first
//! activated tab's window is adopted.
//!
//! Open tab sessions are held here until they end. Only closed tab sessions
//! are handed to the main session, so stored records never contain an open
//! tab session.

use std::collections::HashMap;

use tabtime_protocol::{
    focused_window, Inbound, LookupQuery, LookupResult, TabInfo, STATUS_COMPLETE,
};
use tracing::{debug, info, warn};

use crate::domain::domain_from_url;
use crate::error::Result;
use crate::model::{MainSession, TabSession};
use crate::recovery::{recover_unclean_shutdown, RecoveryReport};
use crate::store::{SessionGateway, SessionSink, StorageWriter, WriteOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NoMainSession,
    MainActiveNoTab,
    MainActiveTabOpen,
}

/// A browser query the host must forward to the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub request_id: u64,
    pub query: LookupQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    /// Tab activated: the previous tab session is already closed.
    Activate,
    /// Navigation finished: supersede only if the tab turns out to be active.
    Refresh,
    /// Window gained focus: start a session for its active tab.
    Focus,
    /// A window closed: end the main session if none remain.
    CountWindows,
}

#[derive(Debug, Clone, Copy)]
struct PendingLookup {
    purpose: Purpose,
    generation: u64,
    recorded_at: i64,
}

pub struct Controller<S: SessionSink> {
    sink: S,
    main_session: Option<MainSession>,
    tab_session: Option<TabSession>,
    pending: HashMap<u64, PendingLookup>,
    next_request_id: u64,
    tab_generation: u64,
    focused_window: Option<i64>,
}

impl Controller<StorageWriter> {
    /// Production startup: repair the previous run's last record, hand the
    /// gateway to a background writer, and open a fresh main session.
    pub fn bootstrap<G>(mut gateway: G, now: i64) -> Result<(Self, Option<RecoveryReport>)>
    where
        G: SessionGateway + Send + 'static,
    {
        let report = match recover_unclean_shutdown(&mut gateway) {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "Recovery check failed; continuing without repair");
                None
            }
        };
        let writer = StorageWriter::spawn(gateway)?;
        Ok((Controller::start(writer, now), report))
    }
}

impl<S: SessionSink> Controller<S> {
    /// Starts tracking with a new main session at `now`.
    pub fn start(sink: S, now: i64) -> Self {
        let mut controller = Controller {
            sink,
            main_session: None,
            tab_session: None,
            pending: HashMap::new(),
            next_request_id: 1,
            tab_generation: 0,
            focused_window: None,
        };
        controller.start_main_session(now);
        controller
    }

    pub fn state(&self) -> ControllerState {
        match (&self.main_session, &self.tab_session) {
            (None, _) => ControllerState::NoMainSession,
            (Some(_), None) => ControllerState::MainActiveNoTab,
            (Some(_), Some(_)) => ControllerState::MainActiveTabOpen,
        }
    }

    pub fn main_session(&self) -> Option<&MainSession> {
        self.main_session.as_ref()
    }

    pub fn tab_session(&self) -> Option<&TabSession> {
        self.tab_session.as_ref()
    }

    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    pub fn focused_window(&self) -> Option<i64> {
        self.focused_window
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Releases the sink without ending the main session. The stored record
    /// stays open and is bounded by recovery on the next startup.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Handles one inbound message. Returns the lookup the host must send,
    /// if any.
    pub fn handle(&mut self, message: Inbound) -> Option<Lookup> {
        match message {
            Inbound::TabActivated {
                tab_id,
                recorded_at,
            } => self.on_tab_activated(tab_id, recorded_at),
            Inbound::TabUpdated {
                tab_id,
                status,
                recorded_at,
            } => self.on_tab_updated(tab_id, status.as_deref(), recorded_at),
            Inbound::WindowFocusChanged {
                window_id,
                recorded_at,
            } => match focused_window(window_id) {
                Some(window_id) => self.on_window_focused(window_id, recorded_at),
                None => {
                    self.on_focus_lost(recorded_at);
                    None
                }
            },
            Inbound::WindowRemoved {
                window_id,
                recorded_at,
            } => self.on_window_removed(window_id, recorded_at),
            Inbound::LookupReply { request_id, result } => {
                self.complete_lookup(request_id, result);
                None
            }
        }
    }

    fn on_tab_activated(&mut self, tab_id: i64, at: i64) -> Option<Lookup> {
        if self.main_session.is_none() {
            debug!(tab_id, "Ignoring tab activation outside a main session");
            return None;
        }
        self.close_tab_session(at);
        self.bump_generation();
        Some(self.issue(Purpose::Activate, LookupQuery::Tab { tab_id }, at))
    }

    fn on_tab_updated(&mut self, tab_id: i64, status: Option<&str>, at: i64) -> Option<Lookup> {
        if status != Some(STATUS_COMPLETE) {
            return None;
        }
        if self.main_session.is_none() {
            debug!(tab_id, "Ignoring tab update outside a main session");
            return None;
        }
        Some(self.issue(Purpose::Refresh, LookupQuery::Tab { tab_id }, at))
    }

    fn on_window_focused(&mut self, window_id: i64, at: i64) -> Option<Lookup> {
        if self.main_session.is_none() {
            self.start_main_session(at);
        } else {
            self.close_tab_session(at);
        }
        self.focused_window = Some(window_id);
        self.bump_generation();
        Some(self.issue(Purpose::Focus, LookupQuery::ActiveTab { window_id }, at))
    }

    fn on_focus_lost(&mut self, at: i64) {
        self.bump_generation();
        self.end_main_session(at, "focus_lost");
    }

    fn on_window_removed(&mut self, window_id: i64, at: i64) -> Option<Lookup> {
        if self.main_session.is_none() {
            debug!(window_id, "Window removed with no main session");
            return None;
        }
        Some(self.issue(Purpose::CountWindows, LookupQuery::WindowCount, at))
    }

    /// Applies a lookup reply. Unknown, stale, or mismatched replies are
    /// dropped.
    pub fn complete_lookup(&mut self, request_id: u64, result: LookupResult) {
        let Some(pending) = self.pending.remove(&request_id) else {
            debug!(request_id, "Dropping reply for unknown lookup");
            return;
        };

        match (pending.purpose, result) {
            (Purpose::CountWindows, LookupResult::WindowCount { count }) => {
                if count == 0 {
                    self.bump_generation();
                    self.end_main_session(pending.recorded_at, "last_window_closed");
                } else {
                    debug!(request_id, count, "Windows remain open");
                }
            }
            (Purpose::Activate | Purpose::Focus | Purpose::Refresh, LookupResult::Tab { tab }) => {
                if pending.generation != self.tab_generation || self.main_session.is_none() {
                    debug!(request_id, "Dropping stale tab lookup");
                    return;
                }
                let Some(tab) = tab else {
                    debug!(request_id, "Tab lookup found nothing");
                    return;
                };
                if let Some(floor) = self.tab_floor() {
                    if pending.recorded_at < floor {
                        debug!(
                            request_id,
                            recorded_at = pending.recorded_at,
                            floor,
                            "Dropping tab lookup overtaken by a later one"
                        );
                        return;
                    }
                }
                self.apply_tab(pending, tab);
            }
            (purpose, result) => {
                warn!(request_id, ?purpose, ?result, "Lookup reply does not match request");
            }
        }
    }

    fn apply_tab(&mut self, pending: PendingLookup, tab: TabInfo) {
        if !tab.active {
            debug!(tab_id = tab.id, "Tab is not active; no session started");
            return;
        }
        // Focus lookups ask for the focused window's tab directly.
        if pending.purpose != Purpose::Focus {
            match self.focused_window {
                Some(window_id) if window_id != tab.window_id => {
                    debug!(
                        tab_id = tab.id,
                        tab_window = tab.window_id,
                        focused = window_id,
                        "Tab is not in the focused window"
                    );
                    return;
                }
                Some(_) => {}
                None if pending.purpose == Purpose::Activate => {
                    self.focused_window = Some(tab.window_id);
                }
                None => {}
            }
        }
        let Some(domain) = tab.url.as_deref().and_then(domain_from_url) else {
            debug!(tab_id = tab.id, "Tab has no trackable domain");
            if pending.purpose == Purpose::Refresh {
                // Navigated away to an untracked page.
                self.close_tab_session(pending.recorded_at);
            }
            return;
        };
        self.open_tab_session(domain, pending.recorded_at);
    }

    /// Invalidates outstanding tab lookups and forgets them. Window-count
    /// lookups stay pending.
    fn bump_generation(&mut self) {
        self.tab_generation += 1;
        self.pending
            .retain(|_, pending| pending.purpose == Purpose::CountWindows);
    }

    /// Earliest timestamp a tab reply may still act on.
    fn tab_floor(&self) -> Option<i64> {
        let open_start = self.tab_session.as_ref().map(TabSession::start_timestamp);
        let closed_end = self
            .main_session
            .as_ref()
            .and_then(MainSession::latest_tab_end);
        open_start.max(closed_end)
    }

    fn issue(&mut self, purpose: Purpose, query: LookupQuery, recorded_at: i64) -> Lookup {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.insert(
            request_id,
            PendingLookup {
                purpose,
                generation: self.tab_generation,
                recorded_at,
            },
        );
        Lookup { request_id, query }
    }

    fn start_main_session(&mut self, at: i64) {
        let session = MainSession::start(at);
        info!(start = at, "Starting main session");
        self.sink.submit(WriteOp::Append(session.clone()));
        self.main_session = Some(session);
    }

    fn end_main_session(&mut self, at: i64, reason: &str) {
        self.close_tab_session(at);
        let Some(mut session) = self.main_session.take() else {
            debug!(reason, "No main session to end");
            return;
        };
        if session.end(at) {
            info!(end = at, reason, "Ending main session");
            self.sink.submit(WriteOp::ReplaceLast(session));
        }
        // Replies for this session's lookups can no longer apply.
        self.pending.clear();
        self.focused_window = None;
    }

    fn open_tab_session(&mut self, domain: String, at: i64) {
        // The host stamps its startup session with its own clock, which can
        // run ahead of the browser's event timestamps.
        let at = self
            .main_session
            .as_ref()
            .map_or(at, |main| at.max(main.start_timestamp()));
        self.close_tab_session(at);
        info!(domain = %domain, start = at, "Starting tab session");
        self.tab_session = Some(TabSession::start(domain, at));
    }

    /// Ends the open tab session, hands it to the main session, and mirrors
    /// the main session to storage.
    fn close_tab_session(&mut self, at: i64) {
        let Some(mut tab) = self.tab_session.take() else {
            return;
        };
        tab.end(at);
        let Some(main) = self.main_session.as_mut() else {
            warn!(domain = %tab.domain(), "Dropping tab session with no main session");
            return;
        };
        debug!(
            domain = %tab.domain(),
            seconds = tab.duration_secs(),
            "Ending tab session"
        );
        match main.add_tab_session(tab) {
            Ok(()) => self.sink.submit(WriteOp::ReplaceLast(main.clone())),
            Err(err) => warn!(error = %err, "Could not append tab session"),
        }
    }
}
