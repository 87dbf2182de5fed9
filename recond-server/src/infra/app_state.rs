use std::{fmt, sync::Arc};

use recond_core::{JobController, ScopeStore};

use crate::infra::config::Config;
use crate::infra::websocket::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scope: Arc<ScopeStore>,
    pub jobs: Arc<JobController>,
    pub sessions: Arc<SessionManager>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let scope = Arc::new(ScopeStore::new(config.data_dir.clone()));
        let jobs = Arc::new(
            JobController::new(scope.clone()).with_tail_limit(config.log_tail_limit),
        );
        Self {
            config: Arc::new(config),
            scope,
            jobs,
            sessions: Arc::new(SessionManager::new()),
        }
    }
}
