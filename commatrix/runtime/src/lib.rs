#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod firewall;
mod matrix;
mod observe;
mod tasks;

pub use self::args::Args;

/// Maps an error to the process exit code, by kind.
///
/// Configuration mistakes exit 2, input-file problems 3, degenerate rule
/// generation 4, remote-execution failures 5, and other cluster failures 6;
/// anything unclassified exits 1.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    use commatrix_core::Error as Core;
    use commatrix_k8s::Error as K8s;

    for cause in error.chain() {
        if let Some(error) = cause.downcast_ref::<Core>() {
            return match error {
                Core::InvalidConfiguration(_) | Core::UnsupportedFormat(_) => 2,
                Core::FileAccess { .. } | Core::Decode { .. } | Core::Encode { .. } => 3,
                Core::NoPortsForRole { .. } => 4,
            };
        }
        if let Some(error) = cause.downcast_ref::<K8s>() {
            return match error {
                K8s::Kubeconfig { .. } => 2,
                K8s::RemoteExecution { .. }
                | K8s::DebugPodNotReady { .. }
                | K8s::DebugPodTimeout { .. } => 5,
                K8s::SourceUnavailable(_) | K8s::MissingNodeRole { .. } | K8s::SocketParse { .. } => 6,
            };
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::exit_code;
    use commatrix_core::{Error as Core, NodeRole};

    #[test]
    fn exit_codes_follow_the_error_kind() {
        let error = anyhow::Error::from(Core::InvalidConfiguration("bad".to_string()));
        assert_eq!(exit_code(&error), 2);

        let error = anyhow::Error::from(Core::NoPortsForRole {
            role: NodeRole::Worker,
        })
        .context("failed generating worker rules");
        assert_eq!(exit_code(&error), 4, "kinds are found through context chains");

        let error = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&error), 1);
    }
}
