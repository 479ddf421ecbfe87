//! The kpack custom resources `kp` reads and writes.
//!
//! Only the fields `kp` touches or displays are modelled. Anything else kpack adds to a resource
//! is dropped when deserializing, which is fine because `kp` never replaces whole objects: it
//! only sends JSON Patches computed from the modelled fields.

pub mod build;
pub mod builder;
pub mod condition;
pub mod image;
pub mod source;
pub mod stack;

pub use build::{Build, BuildPhase, BuildSpec, BuildStatus};
pub use builder::{
    Builder, BuilderSpec, BuilderStatus, BuilderTemplate, BuildpackRef, ClusterBuilder,
    ClusterBuilderSpec, CoreReference, OrderEntry,
};
pub use condition::{Condition, ConditionStatus, Conditions};
pub use image::{
    BuilderKind, BuilderReference, Image, ImageBuild, ImageCacheConfig, ImageSpec, ImageStatus,
    VolumeCache,
};
pub use source::{Blob, Git, Registry, Source, SourceConfig};
pub use stack::{ClusterStack, ClusterStackSpec, ClusterStackStatus};
