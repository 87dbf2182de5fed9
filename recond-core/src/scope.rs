//! File-backed per-project target scope.
//!
//! Each project is a directory under the data root with a `scope/`
//! subdirectory holding one plain-text file per [`ScopeKind`]. Tool runs
//! write their results into sibling directories (`subs/`, `active/`,
//! `urls/`, ...), which is also where [`ScopeStore::project_stats`] reads
//! its counts from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recond_model::{Project, ProjectStats, ProjectSummary, Scope, ScopeKind};
use tokio::sync::Mutex;

use crate::error::{ReconError, Result};

/// Atomic, file-backed store for project scopes.
///
/// All mutations and reads for a given project are serialized through a
/// per-project mutex, so concurrent callers never observe a partially
/// applied change.
pub struct ScopeStore {
    data_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl ScopeStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory a project's scope and results live in.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.data_dir.join(project)
    }

    fn scope_file(&self, project: &str, kind: ScopeKind) -> PathBuf {
        self.project_dir(project).join("scope").join(kind.file_name())
    }

    fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Project names become directory names, so anything that could escape
    /// the data root is rejected up front.
    pub fn validate_name(name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains('/')
            || trimmed.contains('\\')
        {
            return Err(ReconError::InvalidProjectName(name.to_string()));
        }
        Ok(())
    }

    pub async fn create_project(&self, name: &str) -> Result<Project> {
        Self::validate_name(name)?;
        let name = name.trim();
        let lock = self.project_lock(name);
        let _guard = lock.lock().await;

        let project_dir = self.project_dir(name);
        if tokio::fs::try_exists(&project_dir).await? {
            return Err(ReconError::ProjectExists(name.to_string()));
        }

        let scope_dir = project_dir.join("scope");
        tokio::fs::create_dir_all(&scope_dir).await?;
        for kind in ScopeKind::ALL {
            write_lines(&scope_dir.join(kind.file_name()), &[]).await?;
        }

        Ok(Project {
            name: name.to_string(),
            created_at: Utc::now(),
            wildcards: Vec::new(),
            domains: Vec::new(),
            out_of_scope: Vec::new(),
        })
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        if !tokio::fs::try_exists(&self.data_dir).await? {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        let mut projects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let created_at = dir_timestamp(&entry.path()).await;
            projects.push(ProjectSummary { name, created_at });
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub async fn get_project(&self, name: &str) -> Result<Project> {
        let lock = self.project_lock(name);
        let _guard = lock.lock().await;
        self.read_project(name).await
    }

    /// Scope snapshot for a tool run; taken once at tool start.
    pub async fn snapshot(&self, name: &str) -> Result<Scope> {
        let project = self.get_project(name).await?;
        Ok(Scope {
            wildcards: project.wildcards,
            domains: project.domains,
            out_of_scope: project.out_of_scope,
        })
    }

    pub async fn add_target(&self, project: &str, target: &str, kind: &str) -> Result<Project> {
        let kind = parse_kind(kind)?;
        let target = normalize_target(target)?;

        let lock = self.project_lock(project);
        let _guard = lock.lock().await;
        self.ensure_project_exists(project).await?;

        let path = self.scope_file(project, kind);
        let mut lines = read_lines(&path).await?;
        if lines.iter().any(|line| line == &target) {
            return Err(ReconError::DuplicateTarget(target));
        }
        lines.push(target);
        write_lines(&path, &lines).await?;

        self.read_project(project).await
    }

    pub async fn remove_target(&self, project: &str, target: &str, kind: &str) -> Result<Project> {
        let kind = parse_kind(kind)?;
        let target = normalize_target(target)?;

        let lock = self.project_lock(project);
        let _guard = lock.lock().await;
        self.ensure_project_exists(project).await?;

        let path = self.scope_file(project, kind);
        let lines = read_lines(&path).await?;
        let remaining: Vec<String> = lines.iter().filter(|l| *l != &target).cloned().collect();
        if remaining.len() == lines.len() {
            return Err(ReconError::TargetNotFound(target));
        }
        write_lines(&path, &remaining).await?;

        self.read_project(project).await
    }

    pub async fn project_stats(&self, project: &str) -> Result<ProjectStats> {
        let lock = self.project_lock(project);
        let _guard = lock.lock().await;
        self.ensure_project_exists(project).await?;

        let dir = self.project_dir(project);
        Ok(ProjectStats {
            domains: count_lines(&dir.join("scope").join("domain.txt")).await,
            wildcards: count_lines(&dir.join("scope").join("wildcard.txt")).await,
            subdomains: count_lines(&dir.join("active").join("active-subs.txt")).await,
            urls: count_lines(&dir.join("urls").join("active_urls.txt")).await,
            js_urls: count_lines(&dir.join("urls").join("active-js-urls.txt")).await,
        })
    }

    async fn ensure_project_exists(&self, name: &str) -> Result<()> {
        if !tokio::fs::try_exists(self.project_dir(name)).await? {
            return Err(ReconError::ProjectNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn read_project(&self, name: &str) -> Result<Project> {
        let project_dir = self.project_dir(name);
        if !tokio::fs::try_exists(&project_dir).await? {
            return Err(ReconError::ProjectNotFound(name.to_string()));
        }

        Ok(Project {
            name: name.to_string(),
            created_at: dir_timestamp(&project_dir).await,
            wildcards: read_lines(&self.scope_file(name, ScopeKind::Wildcard)).await?,
            domains: read_lines(&self.scope_file(name, ScopeKind::Domain)).await?,
            out_of_scope: read_lines(&self.scope_file(name, ScopeKind::OutOfScope)).await?,
        })
    }
}

fn parse_kind(kind: &str) -> Result<ScopeKind> {
    ScopeKind::parse(kind).ok_or_else(|| ReconError::UnknownScopeKind(kind.to_string()))
}

fn normalize_target(target: &str) -> Result<String> {
    let normalized = target.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ReconError::EmptyTarget);
    }
    Ok(normalized)
}

async fn dir_timestamp(path: &Path) -> DateTime<Utc> {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified),
        Err(_) => Utc::now(),
    }
}

/// Reads a line-per-entry file, treating a missing file as empty.
pub(crate) async fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

pub(crate) async fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    tokio::fs::write(path, content).await
}

async fn count_lines(path: &Path) -> usize {
    read_lines(path).await.map(|l| l.len()).unwrap_or(0)
}
