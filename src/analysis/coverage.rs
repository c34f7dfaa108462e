//! Coverage counter rates.

use serde::{Deserialize, Serialize};

use crate::model::CoverageRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRate {
    pub name: String,
    pub total: u64,
    pub window_secs: Option<f64>,
    /// `total / window`; absent when no window is known.
    pub rate_per_sec: Option<f64>,
}

/// Rates for every counter. An explicit window overrides the one found in
/// the dump.
pub fn coverage_rates(records: &[CoverageRecord], explicit_window: Option<f64>) -> Vec<CoverageRate> {
    records
        .iter()
        .map(|r| {
            let window = explicit_window.or(r.window_secs).filter(|w| *w > 0.0);
            CoverageRate {
                name: r.name.clone(),
                total: r.total,
                window_secs: window,
                rate_per_sec: window.map(|w| ((r.total as f64 / w) * 10_000.0).round() / 10_000.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attributes;

    fn record(total: u64, window: Option<f64>) -> CoverageRecord {
        CoverageRecord {
            name: "netlink_sent".to_string(),
            total,
            window_secs: window,
            extra: Attributes::new(),
        }
    }

    #[test]
    fn test_rate_needs_window() {
        let rates = coverage_rates(&[record(1234, None)], None);
        assert_eq!(rates[0].rate_per_sec, None);

        let rates = coverage_rates(&[record(1200, Some(60.0))], None);
        assert_eq!(rates[0].rate_per_sec, Some(20.0));
    }

    #[test]
    fn test_explicit_window_wins() {
        let rates = coverage_rates(&[record(1200, Some(60.0))], Some(600.0));
        assert_eq!(rates[0].window_secs, Some(600.0));
        assert_eq!(rates[0].rate_per_sec, Some(2.0));
    }
}
