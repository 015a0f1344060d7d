//! Per-node remote execution through short-lived privileged debug pods.

use crate::Error;
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, Namespace, Pod, PodSpec, SecurityContext, Toleration, Volume,
    VolumeMount,
};
use kube::{
    api::{AttachParams, DeleteParams, ObjectMeta, PostParams},
    runtime::{conditions, wait::await_condition},
    Api, Client, ResourceExt,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

pub const DEFAULT_NAMESPACE: &str = "commatrix-debug";
pub const DEFAULT_IMAGE: &str = "quay.io/fedora/fedora:39";

const POD_START_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(120);

/// A privileged host-network pod pinned to one node, used to run commands in
/// the node's namespaces. Callers must `clean` it on every exit path.
pub struct DebugPod {
    api: Api<Pod>,
    node: String,
    name: String,
}

// === impl DebugPod ===

impl DebugPod {
    /// Creates the pod on `node` and waits for it to start running.
    pub async fn create(
        client: &Client,
        namespace: &str,
        node: &str,
        image: &str,
    ) -> Result<Self, Error> {
        let api = Api::<Pod>::namespaced(client.clone(), namespace);
        let pod = api
            .create(&PostParams::default(), &Self::gen_pod(namespace, node, image))
            .await?;
        let name = pod.name_any();
        debug!(%node, pod = %name, "Created debug pod");

        let running = await_condition(api.clone(), &name, conditions::is_pod_running());
        match tokio::time::timeout(POD_START_TIMEOUT, running).await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => return Err(Error::DebugPodNotReady { pod: name, source }),
            Err(_) => {
                return Err(Error::DebugPodTimeout {
                    pod: name,
                    node: node.to_string(),
                })
            }
        }

        Ok(Self {
            api,
            node: node.to_string(),
            name,
        })
    }

    /// Runs a command in the node's root filesystem and returns its stdout.
    pub async fn exec(&self, command: &str) -> Result<String, Error> {
        trace!(node = %self.node, %command, "Executing");
        let mut process = self
            .api
            .exec(
                &self.name,
                ["chroot", "/host", "/bin/sh", "-c", command],
                &AttachParams::default().stderr(false),
            )
            .await?;

        let mut out = String::new();
        if let Some(mut stdout) = process.stdout() {
            stdout
                .read_to_string(&mut out)
                .await
                .map_err(|error| self.exec_error(command, error.to_string()))?;
        }

        let status = match process.take_status() {
            Some(status) => status.await,
            None => None,
        };
        process
            .join()
            .await
            .map_err(|error| self.exec_error(command, error.to_string()))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let message = status
                    .message
                    .unwrap_or_else(|| "command terminated abnormally".to_string());
                return Err(self.exec_error(command, message));
            }
        }

        Ok(out)
    }

    /// Deletes the pod. Callers log failures instead of propagating them, so
    /// cleanup never masks the primary result.
    pub async fn clean(self) -> Result<(), Error> {
        self.api
            .delete(&self.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(Error::SourceUnavailable)
    }

    fn exec_error(&self, command: &str, message: String) -> Error {
        Error::RemoteExecution {
            node: self.node.clone(),
            command: command.to_string(),
            message,
        }
    }

    fn gen_pod(namespace: &str, node: &str, image: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                generate_name: Some(format!("commatrix-debug-{node}-")),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node.to_string()),
                host_network: Some(true),
                host_pid: Some(true),
                restart_policy: Some("Never".to_string()),
                // Debug pods must land on every node, cordoned or not.
                tolerations: Some(vec![Toleration {
                    operator: Some("Exists".to_string()),
                    ..Default::default()
                }]),
                containers: vec![Container {
                    name: "debug".to_string(),
                    image: Some(image.to_string()),
                    command: Some(vec!["sleep".to_string(), "infinity".to_string()]),
                    security_context: Some(SecurityContext {
                        privileged: Some(true),
                        ..Default::default()
                    }),
                    volume_mounts: Some(vec![VolumeMount {
                        name: "host".to_string(),
                        mount_path: "/host".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                volumes: Some(vec![Volume {
                    name: "host".to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: "/".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Creates the debug namespace, tolerating one left over from a prior run.
pub async fn create_namespace(client: &Client, name: &str) -> Result<(), Error> {
    let labels = [
        ("pod-security.kubernetes.io/enforce", "privileged"),
        ("pod-security.kubernetes.io/audit", "privileged"),
        ("pod-security.kubernetes.io/warn", "privileged"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    match Api::<Namespace>::all(client.clone())
        .create(&PostParams::default(), &namespace)
        .await
    {
        Ok(_) => {
            debug!(%name, "Created debug namespace");
            Ok(())
        }
        Err(kube::Error::Api(response)) if response.code == 409 => {
            debug!(%name, "Debug namespace already exists");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

/// Deletes the debug namespace and everything in it.
pub async fn delete_namespace(client: &Client, name: &str) -> Result<(), Error> {
    Api::<Namespace>::all(client.clone())
        .delete(name, &DeleteParams::default())
        .await
        .map(|_| ())
        .map_err(Error::SourceUnavailable)
}
