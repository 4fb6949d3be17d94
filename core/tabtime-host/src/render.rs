//! Plain-text rendering of the popup and dashboard views.

use std::fmt::Write;

use tabtime_core::{DailyAverageMode, DashboardStats, DomainTime, PopupStats};

/// Formats whole seconds as `42s`, `3m 05s`, or `1h 02m 03s`.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn domain_table(out: &mut String, rows: &[DomainTime]) {
    if rows.is_empty() {
        out.push_str("  (no tracked time)\n");
        return;
    }
    let width = rows.iter().map(|row| row.domain.len()).max().unwrap_or(0);
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<width$}  {:>12}",
            row.domain,
            format_duration(row.seconds),
            width = width
        );
    }
}

pub fn render_popup(stats: &PopupStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total: {}", format_duration(stats.total_seconds));
    out.push('\n');
    domain_table(&mut out, &stats.per_domain);
    out
}

pub fn render_dashboard(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total time:      {}", format_duration(stats.total_seconds));
    let _ = writeln!(out, "Main sessions:   {}", stats.main_sessions);
    let _ = writeln!(out, "Tab sessions:    {}", stats.tab_sessions);

    let average = match stats.daily_average_seconds {
        Some(avg) => format_duration(avg.round().max(0.0) as u64),
        None => "n/a".to_string(),
    };
    let mode = match stats.daily_average_mode {
        DailyAverageMode::ActiveDays => "active days",
        DailyAverageMode::LegacyFirstTabSpan => "legacy span",
    };
    let _ = writeln!(out, "Daily average:   {} ({})", average, mode);

    out.push_str("\nTop sites\n");
    domain_table(&mut out, &stats.top_sites);
    out.push_str("\nAll sites\n");
    domain_table(&mut out, &stats.per_domain);
    out
}
