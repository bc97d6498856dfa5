#![doc = include_str!("../README.md")]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]
// If this was in Cargo.toml, it would cover the binaries as well
#![warn(
    missing_docs,
    clippy::panic_in_result_fn,
    clippy::missing_assert_message,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

#[macro_use]
mod macros;

pub mod client;
pub mod endpoint;
pub mod error;
pub mod pacing;
pub mod reactor;
pub mod server;
pub mod session;
pub mod transport;

pub use {
    client::{Client, ClientOptions, ExchangeSummary},
    endpoint::{ConnectWaitMode, Endpoint},
    error::{Error, OperationKind, Result},
    pacing::{FixedDelay, NoDelay, Pacing},
    reactor::{Reactor, ReactorOptions},
    server::{Server, ServerOptions, SessionPool},
    session::{Session, SessionId, SessionState},
    transport::{Accept, DefaultTransport, Transport},
};

mod misc;
pub(crate) use misc::*;

#[cfg(test)]
#[path = "../tests/index.rs"]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]
mod tests;
