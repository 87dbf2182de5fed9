use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project as listed by `GET /api/projects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A project with its full scope, as returned by `GET /api/projects/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub wildcards: Vec<String>,
    pub domains: Vec<String>,
    pub out_of_scope: Vec<String>,
}

/// Aggregate counts over a project's scope and collected results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProjectStats {
    pub domains: usize,
    pub wildcards: usize,
    pub subdomains: usize,
    pub urls: usize,
    pub js_urls: usize,
}

/// A selectable recon module, as listed by `GET /api/modules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
    pub locked: bool,
}
