use thiserror::Error;

/// Failures talking to the cluster or to its nodes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load kubeconfig from {path}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    /// A cluster API listing/translation request failed; the run cannot
    /// continue without the source.
    #[error("cluster flow source unavailable")]
    SourceUnavailable(#[from] kube::Error),

    #[error("node {node} has no recognized role label")]
    MissingNodeRole { node: String },

    #[error("debug pod {pod} never became ready")]
    DebugPodNotReady {
        pod: String,
        #[source]
        source: kube::runtime::wait::Error,
    },

    #[error("timed out waiting for debug pod {pod} on node {node}")]
    DebugPodTimeout { pod: String, node: String },

    #[error("remote command {command:?} failed on node {node}: {message}")]
    RemoteExecution {
        node: String,
        command: String,
        message: String,
    },

    #[error("unparsable socket entry: {line:?}")]
    SocketParse { line: String },
}
