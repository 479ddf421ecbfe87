//! Blocking until kpack has reconciled a resource, for the `--wait` flag.

use std::time::Duration;

use kube::{ResourceExt, runtime::wait::await_condition};
use snafu::{ResultExt as _, Snafu};

use crate::{
    client::{Client, Scoped},
    crd::{ConditionStatus, Conditions},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to watch {kind} {name:?}"))]
    Watch {
        source: kube::runtime::wait::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("timed out after {timeout} waiting for {kind} {name:?} to become ready", timeout = humantime::format_duration(*timeout)))]
    Timeout {
        kind: String,
        name: String,
        timeout: Duration,
    },

    #[snafu(display("cancelled while waiting for {kind} {name:?}"))]
    Cancelled { kind: String, name: String },

    #[snafu(display("{kind} {name:?} was deleted while waiting for it"))]
    Deleted { kind: String, name: String },

    #[snafu(display("{kind} {name:?} is not ready: {message}"))]
    NotReady {
        kind: String,
        name: String,
        message: String,
    },
}

/// Whether kpack has decided the `Ready` condition for the current generation of `resource`.
pub fn is_reconciled<K: Scoped + Conditions>(resource: &K, generation: i64) -> bool {
    resource.ready_status() != ConditionStatus::Unknown
        && resource.observed_generation().unwrap_or_default() >= generation
}

/// Waits until `resource` is reconciled and returns its latest state.
///
/// Fails if it does not become ready within `timeout`, if it turns out not ready, or if the user
/// hits Ctrl-C.
pub async fn wait_until_ready<K>(client: &Client, resource: &K, timeout: Duration) -> Result<K, Error>
where
    K: Scoped + Conditions,
{
    let kind = K::kind_name();
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();
    let generation = resource.meta().generation.unwrap_or_default();

    tracing::info!(%kind, %name, generation, ?timeout, "waiting for resource to become ready");

    let api = client.api::<K>(&namespace);
    let condition = move |object: Option<&K>| {
        object.is_some_and(|object| is_reconciled(object, generation))
    };

    let outcome = tokio::select! {
        outcome = tokio::time::timeout(timeout, await_condition(api, &name, condition)) => outcome,
        _ = tokio::signal::ctrl_c() => return CancelledSnafu { kind, name }.fail(),
    };

    let Ok(watched) = outcome else {
        return TimeoutSnafu {
            kind,
            name,
            timeout,
        }
        .fail();
    };

    let resource = watched
        .with_context(|_| WatchSnafu {
            kind: kind.clone(),
            name: name.clone(),
        })?
        .ok_or_else(|| Error::Deleted {
            kind: kind.clone(),
            name: name.clone(),
        })?;

    match resource.ready_status() {
        ConditionStatus::True => Ok(resource),
        _ => NotReadySnafu {
            kind,
            name,
            message: resource.ready_message(),
        }
        .fail(),
    }
}
