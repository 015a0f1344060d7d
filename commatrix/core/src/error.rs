use crate::{custom::Format, entity::NodeRole};
use thiserror::Error;

/// Failures of matrix construction, encoding and rule generation.
#[derive(Debug, Error)]
pub enum Error {
    /// The format token did not name a recognized encoding.
    #[error("unsupported format {0:?}: options are (json/yaml/csv)")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read {path}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode custom entries as {format}")]
    Decode {
        format: Format,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode the matrix as {format}")]
    Encode {
        format: Format,
        #[source]
        source: EncodeError,
    },

    /// An empty port set renders a degenerate packet-filter rule, so a matrix
    /// with no ports for the target role cannot be compiled.
    #[error("the matrix holds no {role} ports")]
    NoPortsForRole { role: NodeRole },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
