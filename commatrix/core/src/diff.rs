//! Declared-vs-observed matrix diffing.

use crate::entity::{Matrix, CSV_HEADERS};

/// The RPC status daemon binds a random port on every boot, so observed-only
/// records for it are noise and are never reported.
const STATD_SERVICE: &str = "rpc.statd";

/// Renders the line diff between the declared and the observed matrix.
///
/// Declared records are listed first, in matrix order: unprefixed when the
/// observed matrix contains them, `+ `-prefixed when it does not (declared
/// but not observed). Observed records absent from the declared matrix
/// follow, `- `-prefixed (open but undocumented). The format is stable;
/// downstream tooling parses it.
pub fn diff(declared: &Matrix, observed: &Matrix) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(CSV_HEADERS);
    out.push('\n');

    for flow in &declared.flows {
        if observed.contains(flow) {
            out.push_str(&format!("{flow}\n"));
        } else {
            out.push_str(&format!("+ {flow}\n"));
        }
    }

    for flow in &observed.flows {
        if flow.service == STATD_SERVICE {
            continue;
        }
        if !declared.contains(flow) {
            out.push_str(&format!("- {flow}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Direction, FlowRecord, NodeRole, Protocol};

    fn flow(protocol: Protocol, port: u16, service: &str, role: NodeRole) -> FlowRecord {
        FlowRecord {
            direction: Direction::Ingress,
            protocol,
            port,
            namespace: String::new(),
            service: service.to_string(),
            pod: String::new(),
            container: String::new(),
            node_role: role,
            optional: false,
        }
    }

    #[test]
    fn statd_is_never_reported() {
        let declared = Matrix::new(vec![flow(Protocol::Tcp, 22, "sshd", NodeRole::Master)]);
        let observed = Matrix::new(vec![
            flow(Protocol::Tcp, 22, "sshd", NodeRole::Master),
            flow(Protocol::Udp, 45103, "rpc.statd", NodeRole::Master),
        ]);

        let out = diff(&declared, &observed);
        assert_eq!(
            out,
            format!("{CSV_HEADERS}\nIngress,TCP,22,,sshd,,,master,false\n")
        );
    }

    #[test]
    fn every_declared_record_appears_exactly_once() {
        let declared = Matrix::new(vec![
            flow(Protocol::Tcp, 6443, "kube-apiserver", NodeRole::Master),
            flow(Protocol::Tcp, 10250, "kubelet", NodeRole::Worker),
        ]);
        let observed = Matrix::new(vec![
            flow(Protocol::Tcp, 6443, "kube-apiserver", NodeRole::Master),
            flow(Protocol::Tcp, 9100, "node-exporter", NodeRole::Worker),
        ]);

        let out = diff(&declared, &observed);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                CSV_HEADERS,
                "Ingress,TCP,6443,,kube-apiserver,,,master,false",
                "+ Ingress,TCP,10250,,kubelet,,,worker,false",
                "- Ingress,TCP,9100,,node-exporter,,,worker,false",
            ]
        );
    }

    #[test]
    fn matching_matrices_diff_to_their_records() {
        let declared = Matrix::new(vec![flow(Protocol::Udp, 111, "rpcbind", NodeRole::Worker)]);
        let out = diff(&declared, &declared.clone());
        assert_eq!(
            out,
            format!("{CSV_HEADERS}\nIngress,UDP,111,,rpcbind,,,worker,false\n")
        );
    }

    #[test]
    fn optionality_does_not_affect_the_diff() {
        let declared = Matrix::new(vec![FlowRecord {
            optional: true,
            ..flow(Protocol::Tcp, 9100, "node-exporter", NodeRole::Worker)
        }]);
        let observed = Matrix::new(vec![flow(Protocol::Tcp, 9100, "node-exporter", NodeRole::Worker)]);

        let out = diff(&declared, &observed);
        assert!(
            out.lines().all(|line| !line.starts_with("+ ") && !line.starts_with("- ")),
            "{out}"
        );
    }
}
