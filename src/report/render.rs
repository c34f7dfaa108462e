//! JSON rendering.

use super::model::Report;

/// Render a report as pretty-printed JSON.
pub fn render_json(report: &Report) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize report: {}\"}}", e))
}

/// Render a report as single-line JSON.
pub fn render_compact(report: &Report) -> String {
    serde_json::to_string(report)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize report: {}\"}}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RunContext, RunMode};
    use crate::error::DiagError;
    use crate::report::fatal_report;

    #[test]
    fn test_render_round_trips() {
        let run = RunContext::new(RunMode::Full);
        let report = fatal_report(
            &run,
            &DiagError::NoSources {
                reason: "nothing to read".to_string(),
            },
        );
        let pretty = render_json(&report);
        assert!(pretty.contains('\n'));
        let compact = render_compact(&report);
        assert!(!compact.contains('\n'));

        let parsed: Report = serde_json::from_str(&compact).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.status, report.status);
    }
}
