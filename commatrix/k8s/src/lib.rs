#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod client;
pub mod debug;
pub mod endpointslices;
mod error;
pub mod node;
pub mod ss;

pub use self::error::Error;
pub use k8s_openapi::api::core::v1::Node;
pub use kube::{Client, ResourceExt};
