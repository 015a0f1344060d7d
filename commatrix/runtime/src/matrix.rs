//! Declared matrix assembly.

use anyhow::{Context, Result};
use commatrix_core::{custom, statics, Deployment, Env, Format, Matrix};
use commatrix_k8s::{endpointslices, Client};
use std::path::Path;
use tracing::{debug, info};

/// Assembles the declared matrix: endpoint-derived flows, then the static
/// platform catalogue, then operator custom entries, deduplicated with the
/// first occurrence winning. Any source failure aborts the run.
pub async fn generate(
    client: &Client,
    env: Env,
    deployment: Deployment,
    custom_entries: Option<(&Path, &str)>,
) -> Result<Matrix> {
    let mut flows = endpointslices::ingress_flows(client)
        .await
        .context("failed getting endpointslices")?;
    debug!(flows = flows.len(), "Translated endpoint flows");

    flows.extend(statics::static_entries(env, deployment));

    if let Some((path, token)) = custom_entries {
        let format = token.parse::<Format>().context("failed adding custom entries")?;
        let entries =
            custom::load(path, format).context("failed adding custom entries")?;
        debug!(entries = entries.len(), "Loaded custom entries");
        flows.extend(entries);
    }

    let matrix = Matrix::new(flows);
    info!(entries = matrix.flows.len(), "Assembled the declared matrix");
    Ok(matrix)
}
