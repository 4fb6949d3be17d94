//! Aggregate statistics over stored main sessions.
//!
//! Read-only: the popup and dashboard compute everything from the full
//! collection, with no dedicated query API. Durations are summed per tab
//! session in whole seconds, so open tab sessions contribute nothing.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::MainSession;

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// How the dashboard's daily average divides total time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyAverageMode {
    /// Total time over the number of distinct UTC calendar days on which any
    /// tab session started.
    #[default]
    ActiveDays,
    /// Total time over the span from the first main session's first tab
    /// start to the last main session's first tab end. Kept for parity with
    /// older dashboards; it undercounts the span whenever the last main
    /// session has more than one tab session.
    LegacyFirstTabSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainTime {
    pub domain: String,
    pub seconds: u64,
}

/// Compact view: total and per-domain time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupStats {
    pub total_seconds: u64,
    pub per_domain: Vec<DomainTime>,
}

/// Expanded view: adds session counts, top sites, and the daily average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_seconds: u64,
    pub main_sessions: usize,
    pub tab_sessions: usize,
    pub daily_average_seconds: Option<f64>,
    pub daily_average_mode: DailyAverageMode,
    pub top_sites: Vec<DomainTime>,
    pub per_domain: Vec<DomainTime>,
}

pub fn total_seconds(sessions: &[MainSession]) -> u64 {
    sessions
        .iter()
        .flat_map(|session| session.tab_sessions())
        .map(|tab| tab.duration_secs())
        .sum()
}

/// Seconds per domain across all main sessions, longest first (ties by name).
pub fn per_domain(sessions: &[MainSession]) -> Vec<DomainTime> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for tab in sessions.iter().flat_map(|session| session.tab_sessions()) {
        *totals.entry(tab.domain()).or_default() += tab.duration_secs();
    }

    let mut domains: Vec<DomainTime> = totals
        .into_iter()
        .map(|(domain, seconds)| DomainTime {
            domain: domain.to_string(),
            seconds,
        })
        .collect();
    domains.sort_by(|a, b| b.seconds.cmp(&a.seconds).then_with(|| a.domain.cmp(&b.domain)));
    domains
}

pub fn top_sites(sessions: &[MainSession], limit: usize) -> Vec<DomainTime> {
    let mut domains = per_domain(sessions);
    domains.truncate(limit);
    domains
}

/// Average tracked seconds per day, or `None` when there is no day span to
/// divide by.
pub fn daily_average(sessions: &[MainSession], mode: DailyAverageMode) -> Option<f64> {
    let total = total_seconds(sessions) as f64;
    match mode {
        DailyAverageMode::ActiveDays => {
            let days = active_days(sessions);
            (days > 0).then(|| total / days as f64)
        }
        DailyAverageMode::LegacyFirstTabSpan => {
            let first_start = sessions.first()?.tab_sessions().first()?.start_timestamp();
            let last_end = sessions.last()?.tab_sessions().first()?.end_timestamp()?;
            let days = (last_end - first_start) as f64 / MILLIS_PER_DAY;
            (days > 0.0).then(|| total / days)
        }
    }
}

fn active_days(sessions: &[MainSession]) -> usize {
    sessions
        .iter()
        .flat_map(|session| session.tab_sessions())
        .filter_map(|tab| utc_date(tab.start_timestamp()))
        .collect::<BTreeSet<NaiveDate>>()
        .len()
}

fn utc_date(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

pub fn popup_stats(sessions: &[MainSession]) -> PopupStats {
    PopupStats {
        total_seconds: total_seconds(sessions),
        per_domain: per_domain(sessions),
    }
}

pub fn dashboard_stats(
    sessions: &[MainSession],
    mode: DailyAverageMode,
    top_limit: usize,
) -> DashboardStats {
    let per_domain = per_domain(sessions);
    DashboardStats {
        total_seconds: total_seconds(sessions),
        main_sessions: sessions.len(),
        tab_sessions: sessions.iter().map(|s| s.tab_sessions().len()).sum(),
        daily_average_seconds: daily_average(sessions, mode),
        daily_average_mode: mode,
        top_sites: per_domain.iter().take(top_limit).cloned().collect(),
        per_domain,
    }
}
