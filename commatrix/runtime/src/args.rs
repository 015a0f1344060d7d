use crate::{firewall, matrix, observe};
use anyhow::{Context, Result};
use clap::Parser;
use commatrix_core::{diff, nftables, output, Deployment, Env, Format, Matrix, NodeRole};
use commatrix_k8s::{client, debug};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(name = "commatrix", about = "Generates the cluster communication matrix", version)]
pub struct Args {
    #[clap(long, default_value = "commatrix=info,warn", env = "COMMATRIX_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Cluster access configuration; the run cannot start without it.
    #[clap(long, env = "KUBECONFIG")]
    kubeconfig: PathBuf,

    /// Output files directory.
    #[clap(long, default_value = "communication-matrix")]
    dest_dir: PathBuf,

    /// Output format of the matrix files (json/yaml/csv).
    #[clap(long, default_value = "csv")]
    format: Format,

    /// Cluster environment (baremetal/aws).
    #[clap(long, default_value = "baremetal")]
    env: Env,

    /// Deployment type (mno/sno).
    #[clap(long, default_value = "mno")]
    deployment: Deployment,

    /// Adds custom entries from a file to the matrix.
    #[clap(long)]
    custom_entries_path: Option<PathBuf>,

    /// Format of the custom entries file (json/yaml/csv).
    #[clap(long)]
    custom_entries_format: Option<String>,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            kubeconfig,
            dest_dir,
            format,
            env,
            deployment,
            custom_entries_path,
            custom_entries_format,
        } = self;

        log_format
            .try_init(log_level)
            .expect("must configure logging");

        let custom_entries = custom_entries(custom_entries_path, custom_entries_format)?;

        let client = client::from_kubeconfig(&kubeconfig).await?;

        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("failed creating {}", dest_dir.display()))?;

        let declared = matrix::generate(
            &client,
            env,
            deployment,
            custom_entries
                .as_ref()
                .map(|(path, token)| (path.as_path(), token.as_str())),
        )
        .await?;
        write_matrix(&dest_dir, "communication-matrix", &declared, format)?;

        debug::create_namespace(&client, debug::DEFAULT_NAMESPACE).await?;
        let result = async {
            let observed = observe::matrix(&client, &dest_dir).await?;
            write_matrix(&dest_dir, "ss-generated-matrix", &observed, format)?;

            let diff = diff::diff(&declared, &observed);
            fs::write(dest_dir.join("matrix-diff-ss"), diff)
                .context("failed writing the matrix diff")?;
            info!("Wrote the matrix diff");

            firewall::apply(&client, &declared, NodeRole::Master).await
        }
        .await;
        if let Err(error) = debug::delete_namespace(&client, debug::DEFAULT_NAMESPACE).await {
            warn!(%error, "Failed deleting the debug namespace");
        }
        result?;

        // A single-node deployment has no worker flows, so a worker rule
        // file would be degenerate.
        let roles: &[NodeRole] = match deployment {
            Deployment::Sno => &[NodeRole::Master],
            Deployment::Mno => &[NodeRole::Master, NodeRole::Worker],
        };
        for &role in roles {
            let body = nftables::to_nftables(&declared, role)
                .with_context(|| format!("failed generating {role} firewall rules"))?;
            let path = dest_dir.join(format!("nft-file-{role}"));
            fs::write(&path, body)
                .with_context(|| format!("failed writing {}", path.display()))?;
            info!(path = %path.display(), "Wrote the firewall rule file");
        }

        Ok(())
    }
}

/// A custom entries path requires a non-empty format token; a token alone is
/// ignored.
fn custom_entries(
    path: Option<PathBuf>,
    format: Option<String>,
) -> Result<Option<(PathBuf, String)>, commatrix_core::Error> {
    match (path, format) {
        (Some(path), Some(format)) if !format.is_empty() => Ok(Some((path, format))),
        (Some(_), _) => Err(commatrix_core::Error::InvalidConfiguration(
            "--custom-entries-format must be set when --custom-entries-path is".to_string(),
        )),
        (None, _) => Ok(None),
    }
}

fn write_matrix(dest_dir: &Path, stem: &str, matrix: &Matrix, format: Format) -> Result<()> {
    let bytes = output::encode(matrix, format)?;
    let path = dest_dir.join(format!("{stem}.{format}"));
    fs::write(&path, bytes).with_context(|| format!("failed writing {}", path.display()))?;
    info!(path = %path.display(), entries = matrix.flows.len(), "Wrote matrix");
    Ok(())
}
