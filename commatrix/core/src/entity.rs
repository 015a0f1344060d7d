use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

/// Column row shared by the CSV encoding and the diff output.
pub const CSV_HEADERS: &str = "direction,protocol,port,namespace,service,pod,container,nodeRole,optional";

/// Traffic direction of a flow, relative to the node exposing it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ingress,
    Egress,
}

/// Transport protocol of a flow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Role of the nodes a flow applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Worker,
}

/// One expected or observed network flow.
///
/// A flow is identified by every field except `optional`: optionality is
/// metadata and never participates in equality, containment or dedup. Two
/// records differing only in `optional` are the same flow and the first
/// occurrence wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowRecord {
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: u16,
    #[serde(default)]
    pub namespace: String,
    pub service: String,
    #[serde(default)]
    pub pod: String,
    #[serde(default)]
    pub container: String,
    #[serde(rename = "nodeRole")]
    pub node_role: NodeRole,
    #[serde(default)]
    pub optional: bool,
}

/// An ordered collection of flows with no duplicate identities.
///
/// Order reflects merge precedence, not sorting. Matrices are constructed
/// once per run and are immutable afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix {
    pub flows: Vec<FlowRecord>,
}

// === impl Direction ===

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ingress => "Ingress",
            Self::Egress => "Egress",
        })
    }
}

// === impl Protocol ===

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        })
    }
}

// === impl NodeRole ===

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Master => "master",
            Self::Worker => "worker",
        })
    }
}

// === impl FlowRecord ===

impl FlowRecord {
    fn identity(&self) -> (Direction, Protocol, u16, &str, &str, &str, &str, NodeRole) {
        (
            self.direction,
            self.protocol,
            self.port,
            self.namespace.as_str(),
            self.service.as_str(),
            self.pod.as_str(),
            self.container.as_str(),
            self.node_role,
        )
    }
}

impl PartialEq for FlowRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for FlowRecord {}

impl std::hash::Hash for FlowRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for FlowRecord {
    /// Renders the CSV row, in `CSV_HEADERS` order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.direction,
            self.protocol,
            self.port,
            self.namespace,
            self.service,
            self.pod,
            self.container,
            self.node_role,
            self.optional,
        )
    }
}

// === impl Matrix ===

impl Matrix {
    /// Builds a matrix from candidate flows, dropping duplicate identities.
    pub fn new(flows: Vec<FlowRecord>) -> Self {
        Self {
            flows: dedup(flows),
        }
    }

    /// True iff some element has an identity tuple equal to `record`'s.
    pub fn contains(&self, record: &FlowRecord) -> bool {
        self.flows.iter().any(|flow| flow == record)
    }
}

/// Drops later duplicates (by identity tuple), preserving first-seen order.
pub fn dedup(flows: Vec<FlowRecord>) -> Vec<FlowRecord> {
    let mut seen = HashSet::with_capacity(flows.len());
    let mut out = Vec::with_capacity(flows.len());
    for flow in flows {
        if !seen.contains(&flow) {
            seen.insert(flow.clone());
            out.push(flow);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(protocol: Protocol, port: u16, service: &str, optional: bool) -> FlowRecord {
        FlowRecord {
            direction: Direction::Ingress,
            protocol,
            port,
            namespace: String::new(),
            service: service.to_string(),
            pod: String::new(),
            container: String::new(),
            node_role: NodeRole::Master,
            optional,
        }
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let flows = vec![
            flow(Protocol::Tcp, 6443, "kube-apiserver", false),
            flow(Protocol::Tcp, 22, "sshd", false),
            flow(Protocol::Tcp, 6443, "kube-apiserver", false),
            flow(Protocol::Udp, 6443, "kube-apiserver", false),
        ];

        let deduped = dedup(flows);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].port, 6443);
        assert_eq!(deduped[0].protocol, Protocol::Tcp);
        assert_eq!(deduped[1].port, 22);
        assert_eq!(deduped[2].protocol, Protocol::Udp);
    }

    #[test]
    fn dedup_is_idempotent() {
        let flows = vec![
            flow(Protocol::Tcp, 9100, "node-exporter", false),
            flow(Protocol::Tcp, 9100, "node-exporter", false),
            flow(Protocol::Udp, 111, "rpcbind", false),
        ];

        let once = dedup(flows);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn optionality_is_not_identity() {
        let mandatory = flow(Protocol::Tcp, 10250, "kubelet", false);
        let optional = flow(Protocol::Tcp, 10250, "kubelet", true);
        assert_eq!(mandatory, optional);

        let deduped = dedup(vec![optional.clone(), mandatory]);
        assert_eq!(deduped.len(), 1);
        assert!(deduped[0].optional, "first occurrence must win");
    }

    #[test]
    fn contains_ignores_optionality() {
        let matrix = Matrix::new(vec![flow(Protocol::Tcp, 22, "sshd", false)]);
        assert!(matrix.contains(&flow(Protocol::Tcp, 22, "sshd", true)));
        assert!(!matrix.contains(&flow(Protocol::Udp, 22, "sshd", false)));
        assert!(!matrix.contains(&flow(Protocol::Tcp, 22, "other", false)));
    }

    #[test]
    fn display_renders_the_csv_row() {
        let record = flow(Protocol::Tcp, 6443, "kube-apiserver", false);
        assert_eq!(
            record.to_string(),
            "Ingress,TCP,6443,,kube-apiserver,,,master,false"
        );
    }
}
