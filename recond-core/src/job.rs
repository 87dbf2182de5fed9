//! Per-project recon job lifecycle.
//!
//! One [`JobController`] serves every project; each project gets at most one
//! non-terminal job. Control operations mutate job state under a per-project
//! lock and never await while holding it; the driver task is the sole log
//! appender. Observers subscribe to a broadcast channel whose emission order
//! matches the log buffer, and the subscribe happens under the same lock as
//! every emission, so a snapshot plus subscription can neither lose nor
//! duplicate an event.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use recond_model::{JobState, Scope, ToolState};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{self, Plan};
use crate::error::{ReconError, Result};
use crate::runner::{self, RunControls, ToolEvent, ToolOutcome};
use crate::scope::ScopeStore;

const EVENT_CAPACITY: usize = 1024;
const DEFAULT_TAIL_LIMIT: usize = 500;

/// Expands a module id into its command pipeline. Swappable for tests.
pub type Planner = fn(&str, &Scope, &Path) -> Plan;

/// A notification fanned out to every observer of a project's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Log(String),
    Progress(String),
    Status(JobState),
}

/// One tool within a job, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub tool: String,
    pub state: ToolState,
}

/// Point-in-time view of a job, taken atomically with a subscription.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub state: JobState,
    pub log_tail: Vec<String>,
    pub progress: Option<String>,
}

struct RunSignals {
    cancel: CancellationToken,
    pause: watch::Sender<bool>,
}

struct JobInner {
    state: JobState,
    /// Bumped on every start; stale driver tasks from a previous run are
    /// ignored by all epoch-guarded mutations.
    epoch: u64,
    executions: Vec<ToolExecution>,
    log: Vec<String>,
    progress: Option<String>,
    signals: Option<RunSignals>,
}

struct JobHandle {
    inner: Mutex<JobInner>,
    events: broadcast::Sender<JobEvent>,
}

impl JobHandle {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(JobInner {
                state: JobState::Idle,
                epoch: 0,
                executions: Vec::new(),
                log: Vec::new(),
                progress: None,
                signals: None,
            }),
            events,
        }
    }

    fn append_locked(&self, inner: &mut JobInner, line: impl Into<String>) {
        let line = line.into();
        inner.log.push(line.clone());
        let _ = self.events.send(JobEvent::Log(line));
    }

    fn emit_status_locked(&self, inner: &JobInner) {
        let _ = self.events.send(JobEvent::Status(inner.state));
    }

    /// Marks the indexed execution running. Returns `false` when the
    /// execution already reached a terminal state (a stop raced ahead), in
    /// which case the driver skips the tool entirely.
    fn begin_tool(&self, epoch: u64, index: usize, module: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        match inner.executions.get_mut(index) {
            Some(exec) if exec.state == ToolState::Pending => exec.state = ToolState::Running,
            _ => return false,
        }
        self.append_locked(&mut inner, format!("--- Running module: {module} ---"));
        true
    }

    fn finish_tool(&self, epoch: u64, index: usize, module: &str, outcome: &ToolOutcome) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        let next = match outcome {
            ToolOutcome::Completed => ToolState::Done,
            ToolOutcome::Failed(_) => ToolState::Failed,
            ToolOutcome::Cancelled => ToolState::Cancelled,
        };
        if let Some(exec) = inner.executions.get_mut(index)
            && !exec.state.is_terminal()
        {
            exec.state = next;
        }
        match outcome {
            ToolOutcome::Completed => {
                self.append_locked(&mut inner, format!("Module {module} completed."));
            }
            ToolOutcome::Failed(reason) => {
                self.append_locked(&mut inner, format!("Error running module {module}: {reason}"));
            }
            ToolOutcome::Cancelled => {
                self.append_locked(&mut inner, format!("Module {module} stopped by user."));
            }
        }
    }

    fn forward(&self, epoch: u64, event: ToolEvent) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        match event {
            ToolEvent::Log(line) => self.append_locked(&mut inner, line),
            ToolEvent::Progress(progress) => {
                inner.progress = Some(progress.clone());
                let _ = self.events.send(JobEvent::Progress(progress));
            }
        }
    }

    /// Settles the job after the driver drains: natural completion rests at
    /// `Idle`; an explicit stop already logged and settled the state.
    fn finish_job(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.signals = None;
        if inner.state == JobState::Stopped {
            return;
        }
        inner.state = JobState::Idle;
        inner.progress = None;
        self.append_locked(&mut inner, "--- Reconnaissance complete ---");
        self.emit_status_locked(&inner);
        let _ = self.events.send(JobEvent::Progress(String::new()));
    }
}

/// Owns the lifecycle of every project's recon job.
pub struct JobController {
    store: Arc<ScopeStore>,
    jobs: DashMap<String, Arc<JobHandle>>,
    planner: Planner,
    tail_limit: usize,
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("job_count", &self.jobs.len())
            .finish()
    }
}

impl JobController {
    pub fn new(store: Arc<ScopeStore>) -> Self {
        Self {
            store,
            jobs: DashMap::new(),
            planner: catalog::plan,
            tail_limit: DEFAULT_TAIL_LIMIT,
        }
    }

    /// Replaces the module planner; tests use this to substitute shell
    /// pipelines for the real tool commands.
    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_tail_limit(mut self, tail_limit: usize) -> Self {
        self.tail_limit = tail_limit;
        self
    }

    fn handle(&self, project: &str) -> Arc<JobHandle> {
        self.jobs
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(JobHandle::new()))
            .clone()
    }

    /// Starts a job for the project, sequencing the selected modules.
    ///
    /// Fails with `EmptySelection` for an empty selection, `UnknownModule`
    /// when no selected module is known, and `AlreadyRunning` unless the job
    /// is at rest. A rerun resets the previous run's log and executions.
    pub async fn start(&self, project: &str, modules: &[String]) -> Result<()> {
        if modules.is_empty() {
            return Err(ReconError::EmptySelection);
        }
        if !modules.iter().any(|m| catalog::find(m).is_some()) {
            return Err(ReconError::UnknownModule(modules[0].clone()));
        }
        self.store.get_project(project).await?;

        let handle = self.handle(project);
        let (epoch, cancel, pause) = {
            let mut inner = handle.inner.lock();
            if !inner.state.is_rest() {
                return Err(ReconError::AlreadyRunning(project.to_string()));
            }
            inner.epoch += 1;
            inner.state = JobState::Running;
            inner.log.clear();
            inner.progress = None;
            inner.executions = modules
                .iter()
                .map(|m| ToolExecution {
                    tool: m.clone(),
                    state: ToolState::Pending,
                })
                .collect();

            let cancel = CancellationToken::new();
            let (pause_tx, pause_rx) = watch::channel(false);
            inner.signals = Some(RunSignals {
                cancel: cancel.clone(),
                pause: pause_tx,
            });

            handle.append_locked(
                &mut inner,
                format!("Starting reconnaissance for project: {project}"),
            );
            handle.emit_status_locked(&inner);
            (inner.epoch, cancel, pause_rx)
        };

        info!(project, modules = ?modules, "starting recon job");
        let driver = Driver {
            handle,
            store: self.store.clone(),
            planner: self.planner,
            project: project.to_string(),
            modules: modules.to_vec(),
            epoch,
            cancel,
            pause,
        };
        tokio::spawn(driver.run());
        Ok(())
    }

    pub fn pause(&self, project: &str) -> Result<()> {
        let handle = self
            .jobs
            .get(project)
            .map(|h| h.clone())
            .ok_or_else(|| ReconError::NotRunning(project.to_string()))?;
        let mut inner = handle.inner.lock();
        if inner.state != JobState::Running {
            return Err(ReconError::NotRunning(project.to_string()));
        }
        if let Some(signals) = &inner.signals {
            signals.pause.send_replace(true);
        }
        inner.state = JobState::Paused;
        handle.append_locked(&mut inner, "Reconnaissance paused by user.");
        handle.emit_status_locked(&inner);
        Ok(())
    }

    pub fn resume(&self, project: &str) -> Result<()> {
        let handle = self
            .jobs
            .get(project)
            .map(|h| h.clone())
            .ok_or_else(|| ReconError::NotPaused(project.to_string()))?;
        let mut inner = handle.inner.lock();
        if inner.state != JobState::Paused {
            return Err(ReconError::NotPaused(project.to_string()));
        }
        if let Some(signals) = &inner.signals {
            signals.pause.send_replace(false);
        }
        inner.state = JobState::Running;
        handle.append_locked(&mut inner, "Reconnaissance resumed by user.");
        handle.emit_status_locked(&inner);
        Ok(())
    }

    /// Stops a running or paused job: cancels the active tool, marks every
    /// pending execution cancelled, and settles the job at `Stopped`.
    pub fn stop(&self, project: &str) -> Result<()> {
        let handle = self
            .jobs
            .get(project)
            .map(|h| h.clone())
            .ok_or_else(|| ReconError::NotActive(project.to_string()))?;
        let mut inner = handle.inner.lock();
        if !matches!(inner.state, JobState::Running | JobState::Paused) {
            return Err(ReconError::NotActive(project.to_string()));
        }
        inner.state = JobState::Stopped;
        if let Some(signals) = &inner.signals {
            signals.cancel.cancel();
            // A paused run must wake up to observe the cancellation.
            signals.pause.send_replace(false);
        }
        for exec in &mut inner.executions {
            if exec.state == ToolState::Pending {
                exec.state = ToolState::Cancelled;
            }
        }
        handle.append_locked(&mut inner, "Reconnaissance stopped by user.");
        handle.emit_status_locked(&inner);
        Ok(())
    }

    pub fn state(&self, project: &str) -> JobState {
        self.jobs
            .get(project)
            .map(|h| h.inner.lock().state)
            .unwrap_or_default()
    }

    pub fn executions(&self, project: &str) -> Vec<ToolExecution> {
        self.jobs
            .get(project)
            .map(|h| h.inner.lock().executions.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, project: &str) -> JobSnapshot {
        let handle = self.handle(project);
        let inner = handle.inner.lock();
        snapshot_locked(&inner, self.tail_limit)
    }

    /// Atomically takes a snapshot and subscribes to subsequent events.
    ///
    /// Emissions hold the same lock, so the returned receiver sees exactly
    /// the events after the snapshot: nothing lost, nothing duplicated.
    pub fn observe(&self, project: &str) -> (JobSnapshot, broadcast::Receiver<JobEvent>) {
        let handle = self.handle(project);
        let inner = handle.inner.lock();
        let receiver = handle.events.subscribe();
        (snapshot_locked(&inner, self.tail_limit), receiver)
    }
}

fn snapshot_locked(inner: &JobInner, tail_limit: usize) -> JobSnapshot {
    let skip = inner.log.len().saturating_sub(tail_limit);
    JobSnapshot {
        state: inner.state,
        log_tail: inner.log[skip..].to_vec(),
        progress: inner.progress.clone(),
    }
}

/// Sequentially executes a job's modules on its own task.
struct Driver {
    handle: Arc<JobHandle>,
    store: Arc<ScopeStore>,
    planner: Planner,
    project: String,
    modules: Vec<String>,
    epoch: u64,
    cancel: CancellationToken,
    pause: watch::Receiver<bool>,
}

impl Driver {
    async fn run(self) {
        for (index, module) in self.modules.iter().enumerate() {
            let mut controls = RunControls::new(self.cancel.clone(), self.pause.clone());
            if !controls.proceed().await {
                break;
            }
            if !self.handle.begin_tool(self.epoch, index, module) {
                continue;
            }

            if catalog::find(module).is_none() {
                self.handle.finish_tool(
                    self.epoch,
                    index,
                    module,
                    &ToolOutcome::Failed(format!("module {module:?} is not recognized")),
                );
                continue;
            }

            // Scope snapshot is taken at tool start and never refreshed
            // mid-run.
            let scope = match self.store.snapshot(&self.project).await {
                Ok(scope) => scope,
                Err(err) => {
                    self.handle.finish_tool(
                        self.epoch,
                        index,
                        module,
                        &ToolOutcome::Failed(err.to_string()),
                    );
                    continue;
                }
            };

            let plan = (self.planner)(module, &scope, &self.store.project_dir(&self.project));
            let mut run = runner::spawn(module.clone(), plan, controls);
            while let Some(event) = run.events.recv().await {
                self.handle.forward(self.epoch, event);
            }
            let outcome = run.outcome().await;
            let cancelled = outcome == ToolOutcome::Cancelled;
            self.handle.finish_tool(self.epoch, index, module, &outcome);
            if cancelled {
                break;
            }
        }
        self.handle.finish_job(self.epoch);
        info!(project = %self.project, "recon job settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CommandStep;
    use std::time::Duration;

    // Scripted stand-ins for the real pipelines, keyed by catalog ids so
    // start() validation still applies: `fuzzer` fails, `port_scan` is slow,
    // everything else echoes one line.
    fn echo_planner(tool: &str, _scope: &Scope, _dir: &Path) -> Plan {
        match tool {
            "fuzzer" => Plan {
                note: None,
                dirs: Vec::new(),
                steps: vec![CommandStep::shell("exit 2")],
            },
            "port_scan" => Plan {
                note: None,
                dirs: Vec::new(),
                steps: vec![CommandStep::shell(
                    "for i in 1 2 3 4 5; do echo line-$i; sleep 0.1; done",
                )],
            },
            other => Plan {
                note: None,
                dirs: Vec::new(),
                steps: vec![CommandStep::shell(format!("echo {other}-out"))],
            },
        }
    }

    async fn setup() -> (tempfile::TempDir, Arc<ScopeStore>, JobController) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScopeStore::new(dir.path()));
        store.create_project("acme").await.unwrap();
        let controller = JobController::new(store.clone()).with_planner(echo_planner);
        (dir, store, controller)
    }

    fn modules(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    async fn wait_for_rest(controller: &JobController, project: &str) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if controller.state(project).is_rest() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job did not settle in time");
    }

    async fn collect_until_rest(mut rx: broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
        let mut events = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
                Ok(Ok(event)) => {
                    let done = matches!(event, JobEvent::Status(state) if state.is_rest());
                    events.push(event);
                    if done {
                        break;
                    }
                }
                _ => break,
            }
        }
        events
    }

    #[tokio::test]
    async fn job_runs_modules_sequentially_and_rests_idle() {
        let (_dir, _store, controller) = setup().await;
        controller
            .start("acme", &modules(&["subfinder", "probe"]))
            .await
            .unwrap();
        assert_eq!(controller.state("acme"), JobState::Running);

        wait_for_rest(&controller, "acme").await;
        assert_eq!(controller.state("acme"), JobState::Idle);

        let executions = controller.executions("acme");
        assert_eq!(executions.len(), 2);
        assert!(executions.iter().all(|e| e.state == ToolState::Done));

        let snapshot = controller.snapshot("acme");
        let log = snapshot.log_tail.join("\n");
        let first = log.find("Running module: subfinder").expect("first module logged");
        let second = log.find("Running module: probe").expect("second module logged");
        assert!(first < second, "modules must run in selection order");
        assert!(log.contains("Reconnaissance complete"));
    }

    #[tokio::test]
    async fn start_while_running_is_a_conflict() {
        let (_dir, _store, controller) = setup().await;
        controller.start("acme", &modules(&["port_scan"])).await.unwrap();
        assert!(matches!(
            controller.start("acme", &modules(&["subfinder"])).await,
            Err(ReconError::AlreadyRunning(_))
        ));
        controller.stop("acme").unwrap();
        wait_for_rest(&controller, "acme").await;
    }

    #[tokio::test]
    async fn start_validates_selection_and_project() {
        let (_dir, _store, controller) = setup().await;
        assert!(matches!(
            controller.start("acme", &[]).await,
            Err(ReconError::EmptySelection)
        ));
        assert!(matches!(
            controller.start("acme", &modules(&["warp-drive"])).await,
            Err(ReconError::UnknownModule(_))
        ));
        assert!(matches!(
            controller.start("ghost", &modules(&["subfinder"])).await,
            Err(ReconError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_module_does_not_abort_the_job() {
        let (_dir, _store, controller) = setup().await;
        controller
            .start("acme", &modules(&["fuzzer", "subfinder"]))
            .await
            .unwrap();
        wait_for_rest(&controller, "acme").await;

        let executions = controller.executions("acme");
        assert_eq!(executions[0].state, ToolState::Failed);
        assert_eq!(executions[1].state, ToolState::Done);

        let log = controller.snapshot("acme").log_tail.join("\n");
        let failure = log.find("Error running module fuzzer").expect("failure logged");
        let survivor = log.find("Running module: subfinder").expect("next module logged");
        assert!(failure < survivor);
    }

    #[tokio::test]
    async fn stop_cancels_active_and_pending_modules() {
        let (_dir, _store, controller) = setup().await;
        let (_, rx) = controller.observe("acme");
        controller
            .start("acme", &modules(&["port_scan", "subfinder", "probe"]))
            .await
            .unwrap();

        // Let the first module produce some output before stopping.
        let mut rx = rx;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(JobEvent::Log(line)) = rx.recv().await {
                    if line.starts_with("line-") {
                        break;
                    }
                }
            }
        })
        .await
        .expect("first module output");

        controller.stop("acme").unwrap();
        assert_eq!(controller.state("acme"), JobState::Stopped);

        // The driver marks the active execution terminal once the child
        // observes the cancellation; wait for that rather than racing it.
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let executions = controller.executions("acme");
                if executions.iter().all(|e| e.state.is_terminal()) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("executions did not settle");

        let executions = controller.executions("acme");
        assert!(matches!(
            executions[0].state,
            ToolState::Cancelled | ToolState::Done
        ));
        assert_eq!(executions[1].state, ToolState::Cancelled);
        assert_eq!(executions[2].state, ToolState::Cancelled);
        assert_eq!(controller.state("acme"), JobState::Stopped);
    }

    #[tokio::test]
    async fn pause_and_resume_preserve_every_log_line() {
        let (_dir, _store, controller) = setup().await;
        let (_, rx) = controller.observe("acme");
        controller.start("acme", &modules(&["port_scan"])).await.unwrap();

        let mut rx = rx;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(JobEvent::Log(line)) = rx.recv().await {
                    if line.starts_with("line-") {
                        break;
                    }
                }
            }
        })
        .await
        .expect("first line before pause");

        controller.pause("acme").unwrap();
        assert_eq!(controller.state("acme"), JobState::Paused);
        tokio::time::sleep(Duration::from_millis(300)).await;
        controller.resume("acme").unwrap();
        assert_eq!(controller.state("acme"), JobState::Running);

        wait_for_rest(&controller, "acme").await;
        let produced: Vec<String> = controller
            .snapshot("acme")
            .log_tail
            .into_iter()
            .filter(|l| l.starts_with("line-"))
            .collect();
        assert_eq!(produced, vec!["line-1", "line-2", "line-3", "line-4", "line-5"]);
    }

    #[tokio::test]
    async fn two_observers_see_identical_event_order() {
        let (_dir, _store, controller) = setup().await;
        let (_, rx_a) = controller.observe("acme");
        let (_, rx_b) = controller.observe("acme");

        controller
            .start("acme", &modules(&["subfinder", "probe"]))
            .await
            .unwrap();

        let seen_a = collect_until_rest(rx_a).await;
        let seen_b = collect_until_rest(rx_b).await;
        assert!(!seen_a.is_empty());
        assert_eq!(seen_a, seen_b);
    }

    #[tokio::test]
    async fn restart_resets_the_previous_runs_log() {
        let (_dir, _store, controller) = setup().await;
        controller.start("acme", &modules(&["subfinder"])).await.unwrap();
        wait_for_rest(&controller, "acme").await;
        assert!(!controller.snapshot("acme").log_tail.is_empty());

        controller.start("acme", &modules(&["probe"])).await.unwrap();
        wait_for_rest(&controller, "acme").await;

        let log = controller.snapshot("acme").log_tail.join("\n");
        assert!(log.contains("Running module: probe"));
        assert!(!log.contains("Running module: subfinder"));
        assert_eq!(controller.executions("acme").len(), 1);
    }

    #[tokio::test]
    async fn control_operations_validate_job_state() {
        let (_dir, _store, controller) = setup().await;
        assert!(matches!(controller.pause("acme"), Err(ReconError::NotRunning(_))));
        assert!(matches!(controller.resume("acme"), Err(ReconError::NotPaused(_))));
        assert!(matches!(controller.stop("acme"), Err(ReconError::NotActive(_))));

        controller.start("acme", &modules(&["port_scan"])).await.unwrap();
        assert!(matches!(controller.resume("acme"), Err(ReconError::NotPaused(_))));
        controller.pause("acme").unwrap();
        assert!(matches!(controller.pause("acme"), Err(ReconError::NotRunning(_))));
        controller.stop("acme").unwrap();
        wait_for_rest(&controller, "acme").await;
    }
}
