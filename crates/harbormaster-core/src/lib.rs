//! Core domain types and traits for the Harbormaster GitOps controller.
//!
//! This crate contains:
//! - The error taxonomy shared across the workspace
//! - Deploy actions and workload-kind classification
//! - Manifest path convention parsing and change records
//! - Parsed manifest documents and the volume/imagePullSecrets visitor
//! - Package tracking types and state-store key layout
//! - Traits for every external seam: state store, package registry,
//!   manifest host, manifest workspace, deployment executor

pub mod action;
pub mod document;
pub mod error;
pub mod executor;
pub mod host;
pub mod kind;
pub mod manifest;
pub mod naming;
pub mod package;
pub mod registry;
pub mod store;
pub mod workspace;

pub use action::{DeployAction, DeployVerb};
pub use error::{Error, Result};
pub use kind::{ReferenceKind, WorkloadKind};
pub use manifest::{ChangeRecord, ChangeStatus, ManifestPath};
