//! The nimbus dispatch-and-admission engine.
//!
//! Sits between callers and a function-execution cluster: resolves a
//! function name to a running instance, cold-starts one when none exists,
//! gates traffic behind a readiness probe, forwards the request, and
//! rewrites the cluster's response envelope into a plain payload.

pub mod dispatcher;
pub mod health;
pub mod orchestrator;
pub mod resolver;
pub mod state;
pub mod transcode;
pub mod warm;

#[cfg(test)]
mod testutil;

pub use dispatcher::{Dispatcher, InvokeReply, InvokeRequest, StatusPolicy};
