//! Heuristic pod-to-interface mapping.
//!
//! Matchers inspect an interface's external ids and name. Each returns at
//! most one candidate with a confidence; the best candidate over all
//! matchers wins, ties going to the matcher registered first. The matcher
//! set is process-wide and read-mostly: register before running.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{DiagError, Result};
use crate::model::{Interface, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMatch {
    pub pod: String,
    pub namespace: Option<String>,
    pub confidence: Confidence,
    /// Name of the matcher that produced this candidate.
    pub matcher: String,
}

/// One naming or labeling convention.
pub trait PodMatcher: Send + Sync {
    fn name(&self) -> &str;
    fn match_interface(&self, iface: &Interface) -> Option<PodMatch>;
}

fn candidate(matcher: &str, pod: &str, namespace: Option<&str>, confidence: Confidence) -> Option<PodMatch> {
    if pod.is_empty() || namespace.map_or(false, str::is_empty) {
        return None;
    }
    Some(PodMatch {
        pod: pod.to_string(),
        namespace: namespace.map(str::to_string),
        confidence,
        matcher: matcher.to_string(),
    })
}

/// OVN-Kubernetes: `iface-id=<namespace>_<pod>`.
pub struct OvnKubernetesMatcher;

impl PodMatcher for OvnKubernetesMatcher {
    fn name(&self) -> &str {
        "ovn-kubernetes"
    }

    fn match_interface(&self, iface: &Interface) -> Option<PodMatch> {
        let id = iface.external_ids.get("iface-id")?;
        let (namespace, pod) = id.split_once('_')?;
        candidate(self.name(), pod, Some(namespace), Confidence::High)
    }
}

/// Kube-OVN: `iface-id=<pod>.<namespace>`. Namespaces never contain dots,
/// pod names may.
pub struct KubeOvnMatcher;

impl PodMatcher for KubeOvnMatcher {
    fn name(&self) -> &str {
        "kube-ovn"
    }

    fn match_interface(&self, iface: &Interface) -> Option<PodMatch> {
        let id = iface.external_ids.get("iface-id")?;
        if id.contains('_') {
            return None;
        }
        let (pod, namespace) = id.rsplit_once('.')?;
        candidate(self.name(), pod, Some(namespace), Confidence::Medium)
    }
}

const POD_NAME_KEYS: &[&str] = &["pod_name", "pod-name", "k8s_pod_name", "io.kubernetes.pod.name"];
const POD_NAMESPACE_KEYS: &[&str] = &[
    "pod_namespace",
    "pod-namespace",
    "k8s_pod_namespace",
    "io.kubernetes.pod.namespace",
];

/// Explicit pod name / namespace keys in the external ids.
pub struct ExplicitKeysMatcher;

impl PodMatcher for ExplicitKeysMatcher {
    fn name(&self) -> &str {
        "external-ids"
    }

    fn match_interface(&self, iface: &Interface) -> Option<PodMatch> {
        let lookup = |keys: &[&str]| keys.iter().find_map(|k| iface.external_ids.get(*k));
        let pod = lookup(POD_NAME_KEYS)?;
        let namespace = lookup(POD_NAMESPACE_KEYS);
        candidate(self.name(), pod, namespace.map(String::as_str), Confidence::High)
    }
}

/// User-supplied interface-name convention. The regex must have a `pod`
/// capture and may have a `namespace` capture.
pub struct NamePatternMatcher {
    label: String,
    pattern: Regex,
}

impl NamePatternMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| DiagError::Config {
            message: format!("invalid pod name pattern {:?}: {}", pattern, e),
        })?;
        if !regex.capture_names().flatten().any(|n| n == "pod") {
            return Err(DiagError::Config {
                message: format!("pod name pattern {:?} has no `pod` capture", pattern),
            });
        }
        Ok(Self {
            label: format!("name-pattern:{}", pattern),
            pattern: regex,
        })
    }
}

impl PodMatcher for NamePatternMatcher {
    fn name(&self) -> &str {
        &self.label
    }

    fn match_interface(&self, iface: &Interface) -> Option<PodMatch> {
        let caps = self.pattern.captures(&iface.name)?;
        let pod = caps.name("pod")?.as_str();
        let namespace = caps.name("namespace").map(|m| m.as_str());
        candidate(self.name(), pod, namespace, Confidence::Low)
    }
}

/// Ordered matcher set.
pub struct MatcherRegistry {
    matchers: Vec<Arc<dyn PodMatcher>>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MatcherRegistry {
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Built-in conventions, strongest first.
    pub fn builtin() -> Self {
        Self {
            matchers: vec![
                Arc::new(OvnKubernetesMatcher),
                Arc::new(ExplicitKeysMatcher),
                Arc::new(KubeOvnMatcher),
            ],
        }
    }

    pub fn register(&mut self, matcher: Arc<dyn PodMatcher>) {
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matchers(&self) -> &[Arc<dyn PodMatcher>] {
        &self.matchers
    }

    pub fn reset(&mut self) {
        *self = Self::builtin();
    }
}

lazy_static! {
    static ref MATCHER_REGISTRY: RwLock<MatcherRegistry> = RwLock::new(MatcherRegistry::builtin());
}

/// Read access to the process-wide matcher set.
pub fn matcher_registry() -> parking_lot::RwLockReadGuard<'static, MatcherRegistry> {
    MATCHER_REGISTRY.read()
}

pub fn matcher_registry_mut() -> parking_lot::RwLockWriteGuard<'static, MatcherRegistry> {
    MATCHER_REGISTRY.write()
}

/// Highest-confidence candidate; on a tie the earlier matcher wins.
pub fn best_match(matchers: &[Arc<dyn PodMatcher>], iface: &Interface) -> Option<PodMatch> {
    let mut best: Option<PodMatch> = None;
    for matcher in matchers {
        if let Some(found) = matcher.match_interface(iface) {
            if best.as_ref().map_or(true, |b| found.confidence > b.confidence) {
                best = Some(found);
            }
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMapping {
    pub bridge: Option<String>,
    pub interface: String,
    #[serde(flatten)]
    pub pod: PodMatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMappingReport {
    pub mapped: Vec<InterfaceMapping>,
    /// Interfaces no matcher claimed.
    pub unmapped: Vec<String>,
}

/// Map every interface in the topology.
pub fn map_pods(topology: &Topology, matchers: &[Arc<dyn PodMatcher>]) -> PodMappingReport {
    let mut report = PodMappingReport::default();
    for (bridge, iface) in topology.all_interfaces() {
        match best_match(matchers, iface) {
            Some(pod) => report.mapped.push(InterfaceMapping {
                bridge: bridge.map(str::to_string),
                interface: iface.name.clone(),
                pod,
            }),
            None => report.unmapped.push(iface.name.clone()),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, LinkState};
    use std::collections::BTreeSet;

    fn iface(name: &str, ids: &[(&str, &str)]) -> Interface {
        Interface {
            uuid: None,
            name: name.to_string(),
            iface_type: Some(String::new()),
            link_state: LinkState::Up,
            error: None,
            ofport: None,
            mac_in_use: None,
            options: Attributes::new(),
            external_ids: ids
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            extra: Attributes::new(),
            sources: BTreeSet::new(),
        }
    }

    #[test]
    fn test_ovn_kubernetes_convention() {
        let registry = MatcherRegistry::builtin();
        let found = best_match(registry.matchers(), &iface("4f2c-eth0", &[("iface-id", "default_web-0")])).unwrap();
        assert_eq!(found.pod, "web-0");
        assert_eq!(found.namespace.as_deref(), Some("default"));
        assert_eq!(found.confidence, Confidence::High);
        assert_eq!(found.matcher, "ovn-kubernetes");
    }

    #[test]
    fn test_kube_ovn_convention() {
        let registry = MatcherRegistry::builtin();
        let found = best_match(registry.matchers(), &iface("veth", &[("iface-id", "api.v2-7d9f.prod")])).unwrap();
        assert_eq!(found.pod, "api.v2-7d9f");
        assert_eq!(found.namespace.as_deref(), Some("prod"));
        assert_eq!(found.confidence, Confidence::Medium);
    }

    #[test]
    fn test_higher_confidence_beats_earlier_matcher() {
        let registry = MatcherRegistry::builtin();
        let found = best_match(
            registry.matchers(),
            &iface("veth", &[("iface-id", "api.prod"), ("pod_name", "api"), ("pod_namespace", "prod")]),
        )
        .unwrap();
        assert_eq!(found.matcher, "external-ids");
        assert_eq!(found.confidence, Confidence::High);
    }

    #[test]
    fn test_name_pattern_is_low_and_validated() {
        assert!(NamePatternMatcher::new("^veth(?P<x>.+)$").is_err());
        assert!(NamePatternMatcher::new("(").is_err());

        let mut registry = MatcherRegistry::empty();
        registry.register(Arc::new(NamePatternMatcher::new(r"^pod-(?P<namespace>[a-z]+)-(?P<pod>.+)$").unwrap()));
        let found = best_match(registry.matchers(), &iface("pod-kube-coredns-1", &[])).unwrap();
        assert_eq!(found.namespace.as_deref(), Some("kube"));
        assert_eq!(found.pod, "coredns-1");
        assert_eq!(found.confidence, Confidence::Low);
    }

    #[test]
    fn test_unmatched_stays_unmapped() {
        let registry = MatcherRegistry::builtin();
        assert!(best_match(registry.matchers(), &iface("eth0", &[])).is_none());
        assert!(best_match(registry.matchers(), &iface("eth0", &[("iface-id", "noseparator")])).is_none());
    }

    #[test]
    fn test_global_registry_defaults_to_builtin() {
        assert!(matcher_registry().len() >= 3);
    }
}
