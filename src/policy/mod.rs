//! Namespace scheduling policy.
//!
//! A namespace opts its Pods into scheduling constraints through three
//! annotations. Each annotation value is a comma-separated list:
//! - `kojedz.in/nodeselectors`: `key=value` pairs merged into `spec.nodeSelector`
//! - `kojedz.in/podantiaffinitytopologykeys`: topology keys for required
//!   self anti-affinity
//! - `kojedz.in/topologyspreadconstrainttopologykeys`: topology keys for
//!   `DoNotSchedule` spread constraints

pub mod resolver;

use std::collections::BTreeMap;

pub use resolver::{KubeNamespaceResolver, PolicyLookupError, PolicyResolver};

/// Topology keys for required pod anti-affinity terms
pub const ANTI_AFFINITY_ANNOTATION: &str = "kojedz.in/podantiaffinitytopologykeys";

/// Node selector pairs, `label=match[,label=match]`
pub const NODE_SELECTOR_ANNOTATION: &str = "kojedz.in/nodeselectors";

/// Topology keys for topology spread constraints
pub const TOPOLOGY_SPREAD_ANNOTATION: &str = "kojedz.in/topologyspreadconstrainttopologykeys";

/// Scheduling policy derived from a namespace's annotations.
///
/// Built fresh for every admission request and never cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespacePolicy {
    /// Node selector pairs in annotation order (later pairs win on repeated keys)
    pub node_selectors: Vec<(String, String)>,
    /// Topology keys for self anti-affinity, duplicates preserved
    pub anti_affinity_topology_keys: Vec<String>,
    /// Topology keys for topology spread constraints, duplicates preserved
    pub topology_spread_topology_keys: Vec<String>,
}

impl NamespacePolicy {
    /// Extract the policy from a namespace annotation map.
    ///
    /// Unrecognized annotations are ignored and malformed tokens are dropped.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        Self {
            node_selectors: annotations
                .get(NODE_SELECTOR_ANNOTATION)
                .map(|value| parse_node_selectors(value))
                .unwrap_or_default(),
            anti_affinity_topology_keys: annotations
                .get(ANTI_AFFINITY_ANNOTATION)
                .map(|value| parse_topology_keys(value))
                .unwrap_or_default(),
            topology_spread_topology_keys: annotations
                .get(TOPOLOGY_SPREAD_ANNOTATION)
                .map(|value| parse_topology_keys(value))
                .unwrap_or_default(),
        }
    }

    /// True when no annotation contributed anything
    pub fn is_empty(&self) -> bool {
        self.node_selectors.is_empty()
            && self.anti_affinity_topology_keys.is_empty()
            && self.topology_spread_topology_keys.is_empty()
    }
}

/// Parse `k1=v1,k2=v2` into ordered pairs.
///
/// A token must contain exactly one `=`; anything else is dropped.
/// Empty keys or values on either side of the `=` are kept as-is.
pub fn parse_node_selectors(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|token| {
            let mut parts = token.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(val), None) => Some((key.to_string(), val.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Parse `key1,key2` into ordered topology keys, skipping empty tokens.
pub fn parse_topology_keys(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
