//! Remote application of matrix-derived firewall rules.

use crate::tasks;
use anyhow::{Context, Result};
use commatrix_core::{nftables, Matrix, NodeRole};
use commatrix_k8s::{
    debug::{self, DebugPod},
    node, Client, ResourceExt,
};
use tracing::{info, warn};

/// Installs the matrix-derived filter chain on every node of the target role,
/// one task per node. Nodes already provisioned when a later node fails are
/// not rolled back.
pub async fn apply(client: &Client, matrix: &Matrix, role: NodeRole) -> Result<()> {
    let commands = nftables::rule_commands(matrix, role)
        .with_context(|| format!("failed generating {role} firewall rules"))?;

    let nodes = node::list(client).await.context("failed listing nodes")?;
    let mut targets = Vec::new();
    for n in &nodes {
        if node::role(n)? == role {
            targets.push(n.name_any());
        }
    }

    let mut tasks = Vec::with_capacity(targets.len());
    for node_name in &targets {
        let client = client.clone();
        let node = node_name.clone();
        let commands = commands.clone();
        tasks.push((
            node_name.clone(),
            tokio::spawn(async move {
                let pod = DebugPod::create(
                    &client,
                    debug::DEFAULT_NAMESPACE,
                    &node,
                    debug::DEFAULT_IMAGE,
                )
                .await?;
                let result = run_commands(&pod, &commands).await;
                if let Err(error) = pod.clean().await {
                    warn!(%node, %error, "Failed cleaning the debug pod");
                }
                result
            }),
        ));
    }

    tasks::wait_all(tasks, "firewall application").await?;
    info!(%role, nodes = targets.len(), "Applied firewall rules");
    Ok(())
}

async fn run_commands(pod: &DebugPod, commands: &[String]) -> Result<()> {
    for command in commands {
        pod.exec(command).await?;
    }
    Ok(())
}
