//! State store backends for Harbormaster.
//!
//! - [`ConfigMapStore`]: production backend, all key/value pairs in one
//!   namespaced ConfigMap.
//! - [`MemoryStore`]: in-process backend for tests and dry runs.

pub mod configmap;
pub mod memory;

pub use configmap::ConfigMapStore;
pub use memory::MemoryStore;

pub use harbormaster_core::store::StateStore;
