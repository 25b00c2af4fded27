//! Display helpers for CLI output.
//!
//! Core values stay exact; rounding to the nearest half hour happens
//! only here, at the presentation edge.

use timebank_core::ToilSummary;

/// Round hours to the nearest 0.5 for display.
pub fn round_half_hour(hours: f64) -> f64 {
    (hours * 2.0).round() / 2.0
}

/// One-line human rendering of a month balance.
pub fn summary_line(summary: &ToilSummary) -> String {
    format!(
        "{} {}: accrued {:.2} h, used {:.2} h, remaining {:.1} h",
        summary.month,
        summary.user_id,
        summary.accrued,
        summary.used,
        round_half_hour(summary.remaining),
    )
}
