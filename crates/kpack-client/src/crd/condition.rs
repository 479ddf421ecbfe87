use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The condition type kpack uses to report overall readiness.
pub const READY: &str = "Ready";

/// A knative-style status condition, as reported by all kpack resources.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, strum::Display,
)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Read access to the conditions of a resource status.
///
/// Implemented by every kpack resource, so that readiness checks and the `--wait` flag can be
/// written once.
pub trait Conditions {
    fn conditions(&self) -> &[Condition];

    /// The generation the controller last reconciled, if it reports one.
    fn observed_generation(&self) -> Option<i64> {
        None
    }

    fn ready_condition(&self) -> Option<&Condition> {
        self.conditions()
            .iter()
            .find(|condition| condition.type_ == READY)
    }

    fn ready_status(&self) -> ConditionStatus {
        self.ready_condition()
            .map_or(ConditionStatus::Unknown, |condition| condition.status)
    }

    /// The message of the `Ready` condition, or an empty string.
    fn ready_message(&self) -> &str {
        self.ready_condition()
            .and_then(|condition| condition.message.as_deref())
            .unwrap_or_default()
    }
}

/// Implements [`Conditions`] for a resource with an optional `status` that has `conditions` and
/// `observed_generation` fields.
macro_rules! impl_conditions {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl $crate::crd::condition::Conditions for $kind {
                fn conditions(&self) -> &[$crate::crd::condition::Condition] {
                    self.status
                        .as_ref()
                        .map(|status| status.conditions.as_slice())
                        .unwrap_or_default()
                }

                fn observed_generation(&self) -> Option<i64> {
                    self.status
                        .as_ref()
                        .and_then(|status| status.observed_generation)
                }
            }
        )+
    };
}

pub(crate) use impl_conditions;
