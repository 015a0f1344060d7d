//! Compiles a matrix into nftables rule programs.

use crate::{
    entity::{Matrix, NodeRole, Protocol},
    error::Error,
};

/// Renders the rule-file body installing the filter chain for `role`.
///
/// The body is deterministic for a given matrix: ports appear in first-seen
/// matrix order.
pub fn to_nftables(matrix: &Matrix, role: NodeRole) -> Result<Vec<u8>, Error> {
    let (tcp, udp) = role_ports(matrix, role)?;

    let mut body = String::from("#!/usr/sbin/nft -f\n\ntable ip filter {\n");
    body.push_str("\tchain FIREWALL {\n");
    body.push_str("\t\tiif \"lo\" accept\n");
    body.push_str("\t\tct state established,related accept\n");
    body.push_str("\t\ttcp dport { 22 } accept\n");
    body.push_str("\t\tudp dport { 67, 68 } accept\n");
    body.push_str("\t\tip protocol icmp accept\n");
    body.push_str(&format!("\t\ttcp dport {{ {} }} accept\n", join(&tcp)));
    body.push_str(&format!("\t\tudp dport {{ {} }} accept\n", join(&udp)));
    body.push_str("\t\tlog prefix \"firewall \" drop\n");
    body.push_str("\t}\n");
    body.push_str("\tchain INPUT {\n");
    body.push_str("\t\ttype filter hook input priority 0; policy accept;\n");
    body.push_str("\t\tjump FIREWALL\n");
    body.push_str("\t}\n}\n");
    Ok(body.into_bytes())
}

/// The ordered command program installing an equivalent chain on a node.
///
/// The order is semantic: accepts precede the log-and-drop rule, and the
/// INPUT jump that activates the chain comes last.
pub fn rule_commands(matrix: &Matrix, role: NodeRole) -> Result<Vec<String>, Error> {
    let (tcp, udp) = role_ports(matrix, role)?;

    Ok(vec![
        "nft add chain ip filter FIREWALL".to_string(),
        "nft add rule ip filter FIREWALL iif lo accept".to_string(),
        "nft add rule ip filter FIREWALL ct state established,related accept".to_string(),
        "nft add rule ip filter FIREWALL tcp dport { 22 } accept".to_string(),
        "nft add rule ip filter FIREWALL udp dport { 67, 68 } accept".to_string(),
        "nft add rule ip filter FIREWALL ip protocol icmp accept".to_string(),
        format!("nft add rule ip filter FIREWALL tcp dport {{ {} }} accept", join(&tcp)),
        format!("nft add rule ip filter FIREWALL udp dport {{ {} }} accept", join(&udp)),
        "nft add rule ip filter FIREWALL log prefix firewall drop".to_string(),
        "nft add rule ip filter INPUT jump FIREWALL".to_string(),
    ])
}

/// Distinct TCP and UDP ports for `role`, in first-seen matrix order.
///
/// An empty set on either protocol would render a degenerate `{ }` port list,
/// so it is rejected instead of emitted.
fn role_ports(matrix: &Matrix, role: NodeRole) -> Result<(Vec<u16>, Vec<u16>), Error> {
    let mut tcp = Vec::new();
    let mut udp = Vec::new();

    for flow in matrix.flows.iter().filter(|f| f.node_role == role) {
        let ports = match flow.protocol {
            Protocol::Tcp => &mut tcp,
            Protocol::Udp => &mut udp,
        };
        if !ports.contains(&flow.port) {
            ports.push(flow.port);
        }
    }

    if tcp.is_empty() || udp.is_empty() {
        return Err(Error::NoPortsForRole { role });
    }
    Ok((tcp, udp))
}

fn join(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|port| port.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Direction, FlowRecord};

    fn flow(protocol: Protocol, port: u16, role: NodeRole) -> FlowRecord {
        FlowRecord {
            direction: Direction::Ingress,
            protocol,
            port,
            namespace: String::new(),
            service: String::new(),
            pod: String::new(),
            container: String::new(),
            node_role: role,
            optional: false,
        }
    }

    fn matrix() -> Matrix {
        Matrix::new(vec![
            flow(Protocol::Tcp, 6443, NodeRole::Master),
            flow(Protocol::Udp, 111, NodeRole::Master),
            flow(Protocol::Tcp, 22623, NodeRole::Master),
            flow(Protocol::Tcp, 10250, NodeRole::Worker),
            flow(Protocol::Udp, 6081, NodeRole::Worker),
        ])
    }

    #[test]
    fn ports_render_in_first_seen_order() {
        let body = String::from_utf8(to_nftables(&matrix(), NodeRole::Master).unwrap()).unwrap();
        assert!(body.contains("tcp dport { 6443, 22623 } accept"), "{body}");
        assert!(body.contains("udp dport { 111 } accept"), "{body}");
    }

    #[test]
    fn duplicate_ports_collapse() {
        let matrix = Matrix {
            // Same port under both protocols and a service-level duplicate.
            flows: vec![
                flow(Protocol::Tcp, 9100, NodeRole::Worker),
                flow(Protocol::Tcp, 9100, NodeRole::Worker),
                flow(Protocol::Udp, 9100, NodeRole::Worker),
            ],
        };
        let body = String::from_utf8(to_nftables(&matrix, NodeRole::Worker).unwrap()).unwrap();
        assert!(body.contains("tcp dport { 9100 } accept"), "{body}");
        assert!(body.contains("udp dport { 9100 } accept"), "{body}");
    }

    #[test]
    fn missing_ports_for_role_are_rejected() {
        // The worker set has TCP ports only for this matrix slice.
        let matrix = Matrix::new(vec![flow(Protocol::Tcp, 10250, NodeRole::Worker)]);
        assert!(matches!(
            to_nftables(&matrix, NodeRole::Worker),
            Err(Error::NoPortsForRole { role: NodeRole::Worker })
        ));
        assert!(matches!(
            rule_commands(&matrix, NodeRole::Master),
            Err(Error::NoPortsForRole { role: NodeRole::Master })
        ));
    }

    #[test]
    fn command_program_order_is_fixed() {
        let commands = rule_commands(&matrix(), NodeRole::Worker).unwrap();
        assert_eq!(commands.len(), 10);
        assert_eq!(commands[0], "nft add chain ip filter FIREWALL");
        assert_eq!(commands[1], "nft add rule ip filter FIREWALL iif lo accept");
        assert_eq!(
            commands[6],
            "nft add rule ip filter FIREWALL tcp dport { 10250 } accept"
        );
        assert_eq!(
            commands[7],
            "nft add rule ip filter FIREWALL udp dport { 6081 } accept"
        );
        assert_eq!(commands[8], "nft add rule ip filter FIREWALL log prefix firewall drop");
        assert_eq!(commands[9], "nft add rule ip filter INPUT jump FIREWALL");
    }
}
