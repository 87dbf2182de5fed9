use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid project name: {0:?}")]
    InvalidProjectName(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("unknown scope kind: {0:?}")]
    UnknownScopeKind(String),

    #[error("target must not be empty")]
    EmptyTarget,

    #[error("duplicate target: {0}")]
    DuplicateTarget(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("a job is already running for project {0}")]
    AlreadyRunning(String),

    #[error("no running job for project {0}")]
    NotRunning(String),

    #[error("no paused job for project {0}")]
    NotPaused(String),

    #[error("no active job for project {0}")]
    NotActive(String),

    #[error("no modules selected")]
    EmptySelection,

    #[error("unknown module: {0}")]
    UnknownModule(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;
