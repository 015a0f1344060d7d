//! Node listing and role classification.

use crate::Error;
use commatrix_core::NodeRole;
use k8s_openapi::api::core::v1::Node;
use kube::{api::ListParams, Api, Client, ResourceExt};

const MASTER_LABEL: &str = "node-role.kubernetes.io/master";
const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
const WORKER_LABEL: &str = "node-role.kubernetes.io/worker";

/// Lists the cluster's nodes.
pub async fn list(client: &Client) -> Result<Vec<Node>, Error> {
    let nodes = Api::<Node>::all(client.clone())
        .list(&ListParams::default())
        .await?;
    Ok(nodes.items)
}

/// Classifies a node from its role labels.
///
/// A node carrying both control-plane and worker labels (compact clusters)
/// resolves to master, matching how the static tables assign flows.
pub fn role(node: &Node) -> Result<NodeRole, Error> {
    let labels = node.labels();
    if labels.contains_key(MASTER_LABEL) || labels.contains_key(CONTROL_PLANE_LABEL) {
        return Ok(NodeRole::Master);
    }
    if labels.contains_key(WORKER_LABEL) {
        return Ok(NodeRole::Worker);
    }
    Err(Error::MissingNodeRole {
        node: node.name_any(),
    })
}
