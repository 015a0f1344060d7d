//! Live socket-state capture and classification.

use crate::{debug::DebugPod, Error};
use commatrix_core::{Direction, FlowRecord, NodeRole, Protocol};
use regex::Regex;

/// Raw and parsed socket state captured from one node.
pub struct NodeSockets {
    pub flows: Vec<FlowRecord>,
    pub tcp_raw: String,
    pub udp_raw: String,
}

/// Captures the node's listening sockets and classifies them into flows.
pub async fn node_flows(debug: &DebugPod, role: NodeRole) -> Result<NodeSockets, Error> {
    let tcp_raw = debug.exec("ss -anpltH").await?;
    let udp_raw = debug.exec("ss -anpluH").await?;

    let mut flows = parse(&tcp_raw, Protocol::Tcp, role)?;
    flows.extend(parse(&udp_raw, Protocol::Udp, role)?);

    Ok(NodeSockets {
        flows,
        tcp_raw,
        udp_raw,
    })
}

/// Parses headerless `ss` output into flows.
///
/// Only listening sockets count; loopback-bound sockets are node-internal
/// and skipped. The service name is the process owning the socket, when `ss`
/// reports one. Workload attribution (namespace/pod/container) is not
/// recoverable from socket state and stays empty.
fn parse(raw: &str, protocol: Protocol, role: NodeRole) -> Result<Vec<FlowRecord>, Error> {
    let process_re = Regex::new(r#"users:\(\("([^"]+)""#).expect("process pattern must compile");

    let mut flows = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(Error::SocketParse {
                line: line.to_string(),
            });
        }

        // `ss -lt` rows are LISTEN, `ss -lu` rows are UNCONN.
        if fields[0] != "LISTEN" && fields[0] != "UNCONN" {
            continue;
        }

        let local = fields[3];
        if is_loopback(local) {
            continue;
        }

        let port = local
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok())
            .ok_or_else(|| Error::SocketParse {
                line: line.to_string(),
            })?;

        let service = process_re
            .captures(line)
            .map(|captures| captures[1].to_string())
            .unwrap_or_default();

        flows.push(FlowRecord {
            direction: Direction::Ingress,
            protocol,
            port,
            namespace: String::new(),
            service,
            pod: String::new(),
            container: String::new(),
            node_role: role,
            optional: false,
        });
    }

    Ok(flows)
}

fn is_loopback(local: &str) -> bool {
    local.starts_with("127.") || local.starts_with("[::1]")
}
