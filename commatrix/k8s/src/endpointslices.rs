//! Translates workload network endpoints into declared flows.

use crate::{node, Error};
use commatrix_core::{Direction, FlowRecord, NodeRole, Protocol};
use k8s_openapi::api::{
    core::v1::{Pod, Service},
    discovery::v1::{Endpoint, EndpointSlice},
};
use kube::{api::ListParams, Api, Client, ResourceExt};
use std::collections::HashMap;
use tracing::{debug, warn};

const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Derives the cluster's declared ingress flows from its EndpointSlices.
///
/// A slice contributes flows when its owning Service is reachable from
/// outside the cluster network (NodePort or LoadBalancer) or its backing
/// pods share the node's network namespace.
pub async fn ingress_flows(client: &Client) -> Result<Vec<FlowRecord>, Error> {
    let slices = Api::<EndpointSlice>::all(client.clone())
        .list(&ListParams::default())
        .await?;

    let roles = node_roles(client).await?;

    let mut flows = Vec::new();
    for slice in slices.items {
        flows.extend(slice_flows(client, &slice, &roles).await?);
    }
    Ok(flows)
}

async fn node_roles(client: &Client) -> Result<HashMap<String, NodeRole>, Error> {
    let mut roles = HashMap::new();
    for node in node::list(client).await? {
        roles.insert(node.name_any(), node::role(&node)?);
    }
    Ok(roles)
}

async fn slice_flows(
    client: &Client,
    slice: &EndpointSlice,
    roles: &HashMap<String, NodeRole>,
) -> Result<Vec<FlowRecord>, Error> {
    let name = slice.name_any();
    let namespace = match slice.metadata.namespace.clone() {
        Some(namespace) => namespace,
        None => return Ok(vec![]),
    };

    let service_name = match owning_service(slice) {
        Some(service) => service,
        None => {
            debug!(slice = %name, "Skipping slice with no owning service");
            return Ok(vec![]);
        }
    };

    let service = match Api::<Service>::namespaced(client.clone(), &namespace)
        .get_opt(&service_name)
        .await?
    {
        Some(service) => service,
        None => {
            // The service was deleted between listings; its slice is about
            // to go away too.
            debug!(slice = %name, service = %service_name, "Skipping slice with a deleted service");
            return Ok(vec![]);
        }
    };

    let external = service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .map(|type_| matches!(type_, "NodePort" | "LoadBalancer"))
        .unwrap_or(false);

    let pods_api = Api::<Pod>::namespaced(client.clone(), &namespace);
    let mut backing = Vec::new();
    for endpoint in &slice.endpoints {
        let pod = match pod_name(endpoint) {
            Some(pod_name) => pods_api.get_opt(pod_name).await?,
            None => None,
        };
        backing.push((endpoint, pod));
    }

    let host_network = backing.iter().any(|(_, pod)| {
        pod.as_ref()
            .and_then(|p| p.spec.as_ref())
            .and_then(|spec| spec.host_network)
            .unwrap_or(false)
    });

    if !external && !host_network {
        return Ok(vec![]);
    }

    let mut endpoint_roles = Vec::new();
    for (endpoint, _) in &backing {
        if let Some(role) = endpoint
            .node_name
            .as_ref()
            .and_then(|node| roles.get(node.as_str()))
        {
            if !endpoint_roles.contains(role) {
                endpoint_roles.push(*role);
            }
        }
    }

    let (pod_name, pod) = backing
        .first()
        .map(|(endpoint, pod)| {
            (
                endpoint
                    .target_ref
                    .as_ref()
                    .and_then(|r| r.name.clone())
                    .unwrap_or_default(),
                pod.clone(),
            )
        })
        .unwrap_or_default();

    let mut flows = Vec::new();
    for port in slice.ports.iter().flatten() {
        let number = match port.port {
            Some(number) => number as u16,
            None => continue,
        };
        let protocol = match port.protocol.as_deref().unwrap_or("TCP") {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            other => {
                warn!(slice = %name, port = number, protocol = %other, "Skipping unsupported protocol");
                continue;
            }
        };

        let container = pod
            .as_ref()
            .map(|pod| container_for_port(pod, i32::from(number)))
            .unwrap_or_default();

        for role in &endpoint_roles {
            flows.push(FlowRecord {
                direction: Direction::Ingress,
                protocol,
                port: number,
                namespace: namespace.clone(),
                service: service_name.clone(),
                pod: pod_name.clone(),
                container: container.clone(),
                node_role: *role,
                optional: false,
            });
        }
    }

    Ok(flows)
}

/// The slice's owning service, from the canonical label with the owner
/// reference as a fallback.
fn owning_service(slice: &EndpointSlice) -> Option<String> {
    if let Some(service) = slice.labels().get(SERVICE_NAME_LABEL) {
        return Some(service.clone());
    }
    slice
        .metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.kind == "Service")
        .map(|owner| owner.name.clone())
}

fn pod_name(endpoint: &Endpoint) -> Option<&str> {
    let target = endpoint.target_ref.as_ref()?;
    if target.kind.as_deref() != Some("Pod") {
        return None;
    }
    target.name.as_deref()
}

/// The container declaring `port`, when the pod spec names one. Host-network
/// pods often leave listening ports undeclared; those stay unattributed.
fn container_for_port(pod: &Pod, port: i32) -> String {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .find_map(|container| {
            container
                .ports
                .as_ref()?
                .iter()
                .find(|p| p.container_port == port)
                .map(|_| container.name.clone())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::api::ObjectMeta;

    #[test]
    fn owning_service_prefers_the_label() {
        let slice = EndpointSlice {
            address_type: "IPv4".to_string(),
            metadata: ObjectMeta {
                labels: Some(
                    [(SERVICE_NAME_LABEL.to_string(), "router".to_string())]
                        .into_iter()
                        .collect(),
                ),
                owner_references: Some(vec![OwnerReference {
                    kind: "Service".to_string(),
                    name: "stale-owner".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(owning_service(&slice).as_deref(), Some("router"));
    }

    #[test]
    fn owning_service_falls_back_to_the_owner_reference() {
        let slice = EndpointSlice {
            address_type: "IPv4".to_string(),
            metadata: ObjectMeta {
                owner_references: Some(vec![OwnerReference {
                    kind: "Service".to_string(),
                    name: "router".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(owning_service(&slice).as_deref(), Some("router"));
        assert_eq!(owning_service(&EndpointSlice::default()), None);
    }

    #[test]
    fn container_attribution_matches_the_declared_port() {
        let pod = Pod {
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "router".to_string(),
                        ports: Some(vec![ContainerPort {
                            container_port: 443,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    },
                    Container {
                        name: "metrics".to_string(),
                        ports: Some(vec![ContainerPort {
                            container_port: 1936,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(container_for_port(&pod, 1936), "metrics");
        assert_eq!(container_for_port(&pod, 443), "router");
        assert_eq!(container_for_port(&pod, 8080), "");
    }
}
