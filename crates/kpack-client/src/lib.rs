//! Client library behind the `kp` command line tool for kpack.
//!
//! The interesting part lives in [`image`] and [`custom_builder`]: both turn a desired-state
//! descriptor into a mutated copy of an existing resource, and [`patch`] turns the difference
//! between the two into a minimal JSON Patch. Everything else is plumbing around the Kubernetes
//! API ([`client`]) and the kpack custom resources ([`crd`]).

pub mod cli;
pub mod client;
pub mod config;
pub mod crd;
pub mod custom_builder;
pub mod image;
pub mod logging;
pub mod merge;
pub mod patch;
pub mod quantity;
pub mod save;
pub mod secret;
pub mod upload;
pub mod wait;

#[cfg(test)]
pub(crate) mod test_utils;

// External re-exports
pub use k8s_openapi;
pub use kube;
