use crate::Error;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use std::path::Path;
use tracing::debug;

/// Builds a cluster client from an explicit kubeconfig file.
pub async fn from_kubeconfig(path: impl AsRef<Path>) -> Result<Client, Error> {
    let path = path.as_ref();
    let kubeconfig = Kubeconfig::read_from(path).map_err(|source| Error::Kubeconfig {
        path: path.display().to_string(),
        source,
    })?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|source| Error::Kubeconfig {
            path: path.display().to_string(),
            source,
        })?;
    debug!(cluster = %config.cluster_url, "Loaded kubeconfig");
    Client::try_from(config).map_err(Error::SourceUnavailable)
}
