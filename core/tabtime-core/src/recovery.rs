//! Startup repair of a main session left open by an unclean shutdown.
//!
//! A main session only gets an end timestamp on focus loss or when the last
//! window closes. If the previous run died first, the newest stored record is
//! still open. It is closed at the latest moment we can vouch for: the end of
//! its last closed tab session, or its own start if it has none.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::MainSession;
use crate::store::SessionGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub started_at: i64,
    pub repaired_end: i64,
    /// Tab sessions that were still open in the stored record.
    pub closed_tab_sessions: usize,
}

/// Repairs `session` in place if it is still open.
pub fn repair(session: &mut MainSession) -> Option<RecoveryReport> {
    if !session.is_open() {
        return None;
    }

    let bound = session
        .latest_tab_end()
        .unwrap_or_else(|| session.start_timestamp());
    let closed_tab_sessions = session.close_open_tabs(bound);
    // A stray open tab clamps to its own start, which may lie past `bound`.
    let repaired_end = session.latest_tab_end().unwrap_or(bound).max(bound);
    session.end(repaired_end);

    Some(RecoveryReport {
        started_at: session.start_timestamp(),
        repaired_end: session.end_timestamp().unwrap_or(repaired_end),
        closed_tab_sessions,
    })
}

/// Reads the newest stored main session and, if it was left open, persists
/// the repaired record.
pub fn recover_unclean_shutdown<G>(gateway: &mut G) -> Result<Option<RecoveryReport>>
where
    G: SessionGateway + ?Sized,
{
    let Some(mut last) = gateway.read_last()? else {
        return Ok(None);
    };

    let Some(report) = repair(&mut last) else {
        return Ok(None);
    };

    gateway.replace_last(&last)?;
    info!(
        started_at = report.started_at,
        repaired_end = report.repaired_end,
        closed_tab_sessions = report.closed_tab_sessions,
        "Repaired main session left open by previous run"
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TabSession;
    use crate::store::MemoryGateway;

    fn closed_tab(domain: &str, start: i64, end: i64) -> TabSession {
        let mut tab = TabSession::start(domain, start);
        tab.end(end);
        tab
    }

    #[test]
    fn closes_at_latest_tab_end() {
        let mut session = MainSession::start(1_000);
        session
            .add_tab_session(closed_tab("a.com", 1_000, 4_000))
            .expect("add");
        session
            .add_tab_session(closed_tab("b.com", 4_000, 9_500))
            .expect("add");

        let report = repair(&mut session).expect("repaired");
        assert_eq!(session.end_timestamp(), Some(9_500));
        assert_eq!(report.repaired_end, 9_500);
        assert_eq!(report.closed_tab_sessions, 0);
    }

    #[test]
    fn falls_back_to_own_start_without_tabs() {
        let mut session = MainSession::start(2_000);
        repair(&mut session).expect("repaired");
        assert_eq!(session.end_timestamp(), Some(2_000));
    }

    #[test]
    fn closed_session_is_left_alone() {
        let mut session = MainSession::start(0);
        session.end(5_000);
        assert!(repair(&mut session).is_none());
        assert_eq!(session.end_timestamp(), Some(5_000));
    }

    #[test]
    fn stray_open_tab_is_closed_with_zero_duration() {
        let mut session = MainSession::start(0);
        session
            .add_tab_session(closed_tab("a.com", 0, 3_000))
            .expect("add");
        session
            .add_tab_session(TabSession::start("b.com", 6_000))
            .expect("add open");

        let report = repair(&mut session).expect("repaired");
        assert_eq!(report.closed_tab_sessions, 1);
        let stray = &session.tab_sessions()[1];
        assert_eq!(stray.end_timestamp(), Some(6_000));
        assert_eq!(stray.duration_secs(), 0);
        assert_eq!(session.end_timestamp(), Some(6_000));
    }

    #[test]
    fn recover_persists_only_when_needed() {
        let mut finished = MainSession::start(0);
        finished.end(1_000);
        let mut open = MainSession::start(10_000);
        open.add_tab_session(closed_tab("a.com", 10_000, 12_000))
            .expect("add");

        let mut gateway = MemoryGateway::with_sessions(vec![finished.clone(), open]);
        let report = recover_unclean_shutdown(&mut gateway)
            .expect("recover")
            .expect("report");
        assert_eq!(report.repaired_end, 12_000);

        let stored = gateway.read_all().expect("read");
        assert_eq!(stored[0], finished);
        assert_eq!(stored[1].end_timestamp(), Some(12_000));

        assert!(recover_unclean_shutdown(&mut gateway)
            .expect("recover again")
            .is_none());
    }

    #[test]
    fn recover_on_empty_store_is_a_no_op() {
        let mut gateway = MemoryGateway::default();
        assert!(recover_unclean_shutdown(&mut gateway)
            .expect("recover")
            .is_none());
    }
}
