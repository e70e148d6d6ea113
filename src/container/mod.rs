//! Cluster container blueprints and lifecycle
//!
//! A [`ContainerSpec`] describes one container of the emulated cluster
//! as pure data; a [`ContainerHandle`] owns the full lifecycle of the
//! container realized from it.

pub mod handle;
pub mod spec;

pub use handle::{ContainerHandle, ContainerState};
pub use spec::{ContainerRole, ContainerSpec, EnvValue, ResolvedDeps};
