//! Flow-table saturation.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::correlate::CorrelatedModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityStatus {
    Healthy,
    Caution,
    Warning,
    Unavailable,
}

/// Where a figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureSource {
    CapacityReport,
    DatabaseConfig,
    FlowCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTableHealth {
    pub datapath: Option<String>,
    pub current: Option<u64>,
    pub max: Option<u64>,
    pub current_source: Option<FigureSource>,
    pub max_source: Option<FigureSource>,
    pub usage_percent: Option<f64>,
    pub status: CapacityStatus,
    /// Why the status is unavailable.
    pub reason: Option<String>,
}

/// `clamp(100 * current / max, 0, 100)` rounded to 4 decimals; `None` when
/// the maximum is unknown (zero).
pub fn usage_percent(current: u64, max: u64) -> Option<f64> {
    if max == 0 {
        return None;
    }
    let raw = (current as f64 * 100.0 / max as f64).clamp(0.0, 100.0);
    Some((raw * 10_000.0).round() / 10_000.0)
}

/// `< caution` healthy, `caution..=warning` caution, `> warning` warning.
pub fn classify_usage(usage: f64, caution: f64, warning: f64) -> CapacityStatus {
    if usage > warning {
        CapacityStatus::Warning
    } else if usage >= caution {
        CapacityStatus::Caution
    } else {
        CapacityStatus::Healthy
    }
}

fn evaluate(
    datapath: Option<String>,
    current: Option<(u64, FigureSource)>,
    max: Option<(u64, FigureSource)>,
    config: &EngineConfig,
) -> FlowTableHealth {
    let max = max.filter(|(m, _)| *m > 0);
    let (usage, status, reason) = match (current, max) {
        (Some((c, _)), Some((m, _))) => {
            let usage = usage_percent(c, m);
            let status = usage
                .map(|u| classify_usage(u, config.caution_percent, config.warning_percent))
                .unwrap_or(CapacityStatus::Unavailable);
            (usage, status, None)
        }
        (_, None) => (
            None,
            CapacityStatus::Unavailable,
            Some("flow limit unknown".to_string()),
        ),
        (None, _) => (
            None,
            CapacityStatus::Unavailable,
            Some("current flow count unknown".to_string()),
        ),
    };
    FlowTableHealth {
        datapath,
        current: current.map(|(c, _)| c),
        max: max.map(|(m, _)| m),
        current_source: current.map(|(_, s)| s),
        max_source: max.map(|(_, s)| s),
        usage_percent: usage,
        status,
        reason,
    }
}

/// One entry per reported datapath; without a capacity report, a single
/// entry built from the configured limit and the correlated flow count.
pub fn flow_table_health(model: &CorrelatedModel, config: &EngineConfig) -> Vec<FlowTableHealth> {
    let configured_limit = model
        .topology
        .system
        .as_ref()
        .and_then(|s| s.flow_limit())
        .map(|l| (l, FigureSource::DatabaseConfig));
    let flow_count = if model.bridges.is_empty() {
        None
    } else {
        Some((model.total_flows() as u64, FigureSource::FlowCount))
    };

    if model.capacity.is_empty() {
        if configured_limit.is_none() && flow_count.is_none() {
            return Vec::new();
        }
        return vec![evaluate(None, flow_count, configured_limit, config)];
    }

    model
        .capacity
        .iter()
        .map(|record| {
            let current = record
                .current
                .map(|c| (c, FigureSource::CapacityReport))
                .or(flow_count);
            let max = record
                .max
                .filter(|m| *m > 0)
                .map(|m| (m, FigureSource::CapacityReport))
                .or(configured_limit);
            evaluate(record.datapath.clone(), current, max, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CapacityRecord;

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(155, 200_000), Some(0.0775));
        assert_eq!(usage_percent(1, 3), Some(33.3333));
        assert_eq!(usage_percent(500, 100), Some(100.0));
        assert_eq!(usage_percent(10, 0), None);
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(classify_usage(69.9999, 70.0, 90.0), CapacityStatus::Healthy);
        assert_eq!(classify_usage(70.0, 70.0, 90.0), CapacityStatus::Caution);
        assert_eq!(classify_usage(90.0, 70.0, 90.0), CapacityStatus::Caution);
        assert_eq!(classify_usage(90.0001, 70.0, 90.0), CapacityStatus::Warning);
    }

    #[test]
    fn test_capacity_record_drives_health() {
        let model = CorrelatedModel {
            capacity: vec![CapacityRecord {
                datapath: Some("system@ovs-system".into()),
                current: Some(155),
                max: Some(200_000),
                average: None,
                peak: None,
            }],
            ..CorrelatedModel::default()
        };
        let health = flow_table_health(&model, &EngineConfig::default());
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].usage_percent, Some(0.0775));
        assert_eq!(health[0].status, CapacityStatus::Healthy);
        assert_eq!(health[0].max_source, Some(FigureSource::CapacityReport));
    }

    #[test]
    fn test_zero_limit_is_unknown() {
        let model = CorrelatedModel {
            capacity: vec![CapacityRecord {
                datapath: None,
                current: Some(10),
                max: Some(0),
                average: None,
                peak: None,
            }],
            ..CorrelatedModel::default()
        };
        let health = flow_table_health(&model, &EngineConfig::default());
        assert_eq!(health[0].status, CapacityStatus::Unavailable);
        assert_eq!(health[0].reason.as_deref(), Some("flow limit unknown"));
    }

    #[test]
    fn test_no_inputs_no_entries() {
        assert!(flow_table_health(&CorrelatedModel::default(), &EngineConfig::default()).is_empty());
    }
}
