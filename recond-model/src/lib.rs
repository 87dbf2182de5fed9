//! Core data model definitions shared across Recond crates.
#![allow(missing_docs)]

pub mod job;
pub mod project;
pub mod scope;
pub mod wire;

// Intentionally curated re-exports for downstream consumers.
pub use job::{JobState, ToolState};
pub use project::{ModuleInfo, Project, ProjectStats, ProjectSummary};
pub use scope::{Scope, ScopeKind};
pub use wire::{ClientAction, ClientRequest, ServerMessage};
