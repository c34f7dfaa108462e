//! Finding types shared by every analyzer check.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Stable finding codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    ActiveDrop,
    InactiveDrop,
    PortErrors,
    FlowTableCaution,
    FlowTableWarning,
    InterfaceError,
    LinkDown,
    OrphanInterface,
    OrphanPort,
    UnattachedFlows,
}

impl FindingCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCode::ActiveDrop => "ACTIVE_DROP",
            FindingCode::InactiveDrop => "INACTIVE_DROP",
            FindingCode::PortErrors => "PORT_ERRORS",
            FindingCode::FlowTableCaution => "FLOW_TABLE_CAUTION",
            FindingCode::FlowTableWarning => "FLOW_TABLE_WARNING",
            FindingCode::InterfaceError => "INTERFACE_ERROR",
            FindingCode::LinkDown => "LINK_DOWN",
            FindingCode::OrphanInterface => "ORPHAN_INTERFACE",
            FindingCode::OrphanPort => "ORPHAN_PORT",
            FindingCode::UnattachedFlows => "UNATTACHED_FLOWS",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FindingCode::ActiveDrop | FindingCode::FlowTableWarning | FindingCode::InterfaceError => {
                Severity::Error
            }
            FindingCode::PortErrors
            | FindingCode::FlowTableCaution
            | FindingCode::LinkDown
            | FindingCode::OrphanInterface
            | FindingCode::OrphanPort
            | FindingCode::UnattachedFlows => Severity::Warn,
            FindingCode::InactiveDrop => Severity::Info,
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analyzer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
    /// `key=value` context entries (bridge, port, flow, ...).
    pub context: Vec<String>,
}

impl Finding {
    pub fn new(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.context.push(format!("{}={}", key, value));
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

/// Errors first, then warnings, then info; stable within a severity.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by_key(|f| f.severity);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_errors_first_and_stable() {
        let mut findings = vec![
            Finding::new(FindingCode::InactiveDrop, "a"),
            Finding::new(FindingCode::LinkDown, "b"),
            Finding::new(FindingCode::ActiveDrop, "c"),
            Finding::new(FindingCode::PortErrors, "d"),
        ];
        sort_findings(&mut findings);
        let order: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&FindingCode::FlowTableCaution).unwrap();
        assert_eq!(json, "\"FLOW_TABLE_CAUTION\"");
        let finding = Finding::new(FindingCode::ActiveDrop, "x").with("bridge", "br-int");
        assert_eq!(finding.context, vec!["bridge=br-int".to_string()]);
        assert_eq!(finding.severity, Severity::Error);
    }
}
