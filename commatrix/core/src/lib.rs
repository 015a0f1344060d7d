#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod entity;
mod error;

pub mod custom;
pub mod diff;
pub mod nftables;
pub mod output;
pub mod statics;

pub use self::{
    custom::Format,
    entity::{dedup, Direction, FlowRecord, Matrix, NodeRole, Protocol, CSV_HEADERS},
    error::{DecodeError, EncodeError, Error},
    statics::{Deployment, Env},
};
