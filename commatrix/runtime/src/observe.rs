//! Observed matrix construction from live node socket state.

use crate::tasks;
use anyhow::{Context, Result};
use commatrix_core::{FlowRecord, Matrix, NodeRole};
use commatrix_k8s::{
    debug::{self, DebugPod},
    node, ss, Client, ResourceExt,
};
use parking_lot::Mutex;
use std::{fs, path::Path, sync::Arc};
use tracing::{info, warn};

/// Per-run accumulator of node captures. The lock is held only to append,
/// never across I/O.
#[derive(Default)]
struct Captures {
    flows: Vec<FlowRecord>,
    tcp_raw: String,
    udp_raw: String,
}

/// Builds the observed matrix by inspecting live socket state on every node,
/// one task per node. Raw `ss` output is preserved under `dest_dir`.
pub async fn matrix(client: &Client, dest_dir: &Path) -> Result<Matrix> {
    let nodes = node::list(client).await.context("failed listing nodes")?;
    let mut targets = Vec::with_capacity(nodes.len());
    for n in &nodes {
        targets.push((n.name_any(), node::role(n)?));
    }

    let captures = capture_all(client, targets).await?;

    fs::write(dest_dir.join("raw-ss-tcp"), &captures.tcp_raw)
        .context("failed writing the raw TCP socket state")?;
    fs::write(dest_dir.join("raw-ss-udp"), &captures.udp_raw)
        .context("failed writing the raw UDP socket state")?;

    let matrix = Matrix::new(captures.flows);
    info!(entries = matrix.flows.len(), nodes = nodes.len(), "Assembled the observed matrix");
    Ok(matrix)
}

async fn capture_all(client: &Client, targets: Vec<(String, NodeRole)>) -> Result<Captures> {
    let acc = Arc::new(Mutex::new(Captures::default()));

    let mut tasks = Vec::with_capacity(targets.len());
    for (node_name, role) in targets {
        let client = client.clone();
        let acc = acc.clone();
        let node = node_name.clone();
        tasks.push((
            node_name,
            tokio::spawn(async move {
                let pod = DebugPod::create(
                    &client,
                    debug::DEFAULT_NAMESPACE,
                    &node,
                    debug::DEFAULT_IMAGE,
                )
                .await?;
                let captured = ss::node_flows(&pod, role).await;
                if let Err(error) = pod.clean().await {
                    warn!(%node, %error, "Failed cleaning the debug pod");
                }
                let sockets = captured?;

                let mut acc = acc.lock();
                acc.flows.extend(sockets.flows);
                acc.tcp_raw
                    .push_str(&format!("node: {node}\n{}\n", sockets.tcp_raw));
                acc.udp_raw
                    .push_str(&format!("node: {node}\n{}\n", sockets.udp_raw));
                Ok(())
            }),
        ));
    }

    tasks::wait_all(tasks, "socket capture").await?;

    let acc = Arc::try_unwrap(acc)
        .ok()
        .expect("all capture tasks must have been joined");
    Ok(acc.into_inner())
}
