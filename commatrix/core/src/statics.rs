//! Platform-reserved flows that are independent of live cluster state.

use crate::{
    entity::{Direction, FlowRecord, NodeRole, Protocol},
    error::Error,
};
use std::str::FromStr;

/// Infrastructure environment the cluster runs on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Env {
    Baremetal,
    Aws,
}

/// Deployment topology: single-node or multi-node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Deployment {
    Sno,
    Mno,
}

// === impl Env ===

impl FromStr for Env {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "baremetal" => Ok(Self::Baremetal),
            "aws" => Ok(Self::Aws),
            s => Err(Error::InvalidConfiguration(format!(
                "invalid cluster environment {s:?}: options are (baremetal/aws)"
            ))),
        }
    }
}

// === impl Deployment ===

impl FromStr for Deployment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "sno" => Ok(Self::Sno),
            "mno" => Ok(Self::Mno),
            s => Err(Error::InvalidConfiguration(format!(
                "invalid deployment type {s:?}: options are (mno/sno)"
            ))),
        }
    }
}

/// Platform-reserved flows for the given environment and topology.
///
/// Tables are appended in a fixed order: the environment master table, then
/// (multi-node only) the environment worker table, then the shared master
/// table, then (multi-node only) the multi-node and shared worker tables.
/// Tables overlap; callers dedup.
pub fn static_entries(env: Env, deployment: Deployment) -> Vec<FlowRecord> {
    let mut entries = match env {
        Env::Baremetal => baremetal_master(),
        Env::Aws => aws_master(),
    };

    if deployment == Deployment::Mno {
        entries.extend(match env {
            Env::Baremetal => baremetal_worker(),
            Env::Aws => aws_worker(),
        });
    }

    entries.extend(general_master());
    if deployment == Deployment::Sno {
        return entries;
    }

    entries.extend(multi_node());
    entries.extend(general_worker());
    entries
}

fn flow(
    protocol: Protocol,
    port: u16,
    service: &str,
    node_role: NodeRole,
    optional: bool,
) -> FlowRecord {
    FlowRecord {
        direction: Direction::Ingress,
        protocol,
        port,
        namespace: String::new(),
        service: service.to_string(),
        pod: String::new(),
        container: String::new(),
        node_role,
        optional,
    }
}

fn general_master() -> Vec<FlowRecord> {
    use NodeRole::Master;
    use Protocol::*;
    vec![
        flow(Tcp, 22, "sshd", Master, false),
        flow(Tcp, 111, "rpcbind", Master, false),
        flow(Udp, 111, "rpcbind", Master, false),
        flow(Tcp, 6443, "kube-apiserver", Master, false),
        flow(Tcp, 9100, "node-exporter", Master, false),
        flow(Tcp, 9537, "crio-metrics", Master, false),
        flow(Tcp, 10250, "kubelet", Master, false),
        flow(Tcp, 10257, "kube-controller-manager", Master, false),
        flow(Tcp, 10259, "kube-scheduler", Master, false),
        flow(Tcp, 22623, "machine-config-server", Master, false),
    ]
}

fn general_worker() -> Vec<FlowRecord> {
    use NodeRole::Worker;
    use Protocol::*;
    vec![
        flow(Tcp, 22, "sshd", Worker, false),
        flow(Tcp, 111, "rpcbind", Worker, false),
        flow(Udp, 111, "rpcbind", Worker, false),
        flow(Tcp, 9100, "node-exporter", Worker, false),
        flow(Tcp, 9537, "crio-metrics", Worker, false),
        flow(Tcp, 10250, "kubelet", Worker, false),
    ]
}

fn multi_node() -> Vec<FlowRecord> {
    use NodeRole::*;
    use Protocol::*;
    vec![
        flow(Tcp, 2379, "etcd", Master, false),
        flow(Tcp, 2380, "etcd", Master, false),
        flow(Udp, 6081, "ovn-kubernetes", Master, false),
        flow(Udp, 6081, "ovn-kubernetes", Worker, false),
        // Also present in the shared worker table; dedup collapses it.
        flow(Tcp, 9100, "node-exporter", Worker, false),
    ]
}

fn baremetal_master() -> Vec<FlowRecord> {
    use NodeRole::Master;
    use Protocol::*;
    vec![
        flow(Tcp, 5050, "ironic-inspector", Master, true),
        flow(Tcp, 6180, "httpd", Master, true),
        flow(Tcp, 6385, "ironic", Master, true),
        flow(Udp, 67, "dnsmasq", Master, true),
        flow(Udp, 69, "tftp", Master, true),
        flow(Udp, 5353, "mdns-publisher", Master, false),
    ]
}

fn baremetal_worker() -> Vec<FlowRecord> {
    vec![flow(
        Protocol::Udp,
        5353,
        "mdns-publisher",
        NodeRole::Worker,
        false,
    )]
}

fn aws_master() -> Vec<FlowRecord> {
    use NodeRole::Master;
    use Protocol::Tcp;
    vec![
        flow(Tcp, 10258, "cloud-controller-manager", Master, false),
        flow(Tcp, 10260, "cloud-controller-manager", Master, false),
    ]
}

fn aws_worker() -> Vec<FlowRecord> {
    vec![flow(
        Protocol::Tcp,
        10300,
        "csi-livenessprobe",
        NodeRole::Worker,
        false,
    )]
}
