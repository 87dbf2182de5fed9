//! Executes one module pipeline as a stream of log events.
//!
//! A run owns its child processes: output is pulled line by line and
//! forwarded over an mpsc channel, pause is observed before every pull (a
//! paused run stops draining the pipes, so buffered output survives for
//! resume), and cancellation kills the active child within a bounded grace
//! period. No event is emitted after cancellation is observed.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::catalog::{CommandStep, Plan};

/// How long a killed child gets to exit before the runner stops waiting.
const KILL_GRACE: Duration = Duration::from_secs(2);

const EVENT_BUFFER: usize = 256;

/// An event produced by a running tool, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    Log(String),
    Progress(String),
}

/// Terminal result of a tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Cooperative pause/cancel signals shared between a job and its active run.
#[derive(Debug, Clone)]
pub struct RunControls {
    cancel: CancellationToken,
    pause: watch::Receiver<bool>,
}

impl RunControls {
    pub fn new(cancel: CancellationToken, pause: watch::Receiver<bool>) -> Self {
        Self { cancel, pause }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the run may proceed. Blocks while paused; returns
    /// `false` when the run was cancelled instead.
    pub async fn proceed(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !*self.pause.borrow() {
            return true;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            unpaused = self.pause.wait_for(|paused| !*paused) => unpaused.is_ok(),
        }
    }
}

/// Handle to a spawned tool run: drain `events` until it closes, then await
/// the outcome.
#[derive(Debug)]
pub struct ToolRun {
    pub events: mpsc::Receiver<ToolEvent>,
    handle: JoinHandle<ToolOutcome>,
}

impl ToolRun {
    pub async fn outcome(self) -> ToolOutcome {
        self.handle
            .await
            .unwrap_or_else(|_| ToolOutcome::Failed("tool task panicked".to_string()))
    }
}

/// Spawns a module pipeline on its own task.
pub fn spawn(tool: impl Into<String>, plan: Plan, controls: RunControls) -> ToolRun {
    let tool = tool.into();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let handle = tokio::spawn(async move { execute(tool, plan, controls, tx).await });
    ToolRun { events: rx, handle }
}

async fn execute(
    tool: String,
    plan: Plan,
    mut controls: RunControls,
    events: mpsc::Sender<ToolEvent>,
) -> ToolOutcome {
    if let Some(note) = plan.note {
        if events.send(ToolEvent::Log(note)).await.is_err() {
            return ToolOutcome::Cancelled;
        }
    }

    for dir in &plan.dirs {
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            return ToolOutcome::Failed(format!(
                "failed to create output directory {}: {err}",
                dir.display()
            ));
        }
    }

    let total = plan.steps.len();
    let mut failure: Option<String> = None;

    for (index, step) in plan.steps.into_iter().enumerate() {
        if !controls.proceed().await {
            return ToolOutcome::Cancelled;
        }
        if events
            .send(ToolEvent::Log(format!("$ {}", step.title)))
            .await
            .is_err()
        {
            return ToolOutcome::Cancelled;
        }

        match run_step(&step, &mut controls, &events).await {
            StepStatus::Completed => {}
            StepStatus::Failed(reason) => {
                let _ = events
                    .send(ToolEvent::Log(format!("Error running {}: {reason}", step.program)))
                    .await;
                failure = Some(reason);
            }
            StepStatus::Cancelled => return ToolOutcome::Cancelled,
        }

        if events
            .send(ToolEvent::Progress(format!(
                "{tool}: step {}/{} finished",
                index + 1,
                total
            )))
            .await
            .is_err()
        {
            return ToolOutcome::Cancelled;
        }
    }

    match failure {
        None => ToolOutcome::Completed,
        Some(reason) => ToolOutcome::Failed(reason),
    }
}

enum StepStatus {
    Completed,
    Failed(String),
    Cancelled,
}

async fn run_step(
    step: &CommandStep,
    controls: &mut RunControls,
    events: &mpsc::Sender<ToolEvent>,
) -> StepStatus {
    let mut command = Command::new(&step.program);
    command
        .args(&step.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return StepStatus::Failed(format!("failed to start {}: {err}", step.program));
        }
    };
    debug!(program = %step.program, pid = child.id(), "spawned pipeline step");

    let stderr_pump = child.stderr.take().map(|stderr| {
        let events = events.clone();
        let mut controls = controls.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                if !controls.proceed().await {
                    break;
                }
                tokio::select! {
                    _ = controls.cancel.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if events.send(ToolEvent::Log(line)).await.is_err() {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
            }
        })
    });

    let abort_pump = |pump: Option<JoinHandle<()>>| {
        if let Some(pump) = pump {
            pump.abort();
        }
    };

    let mut cancelled = false;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            if !controls.proceed().await {
                cancelled = true;
                break;
            }
            tokio::select! {
                _ = controls.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if events.send(ToolEvent::Log(line)).await.is_err() {
                            cancelled = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = events
                            .send(ToolEvent::Log(format!("output read error: {err}")))
                            .await;
                        break;
                    }
                }
            }
        }
    }

    if cancelled {
        kill_child(&mut child).await;
        abort_pump(stderr_pump);
        return StepStatus::Cancelled;
    }

    let status = tokio::select! {
        _ = controls.cancel.cancelled() => {
            kill_child(&mut child).await;
            abort_pump(stderr_pump);
            return StepStatus::Cancelled;
        }
        status = child.wait() => status,
    };

    if let Some(pump) = stderr_pump {
        let _ = pump.await;
    }

    match status {
        Ok(status) if status.success() => StepStatus::Completed,
        Ok(status) => StepStatus::Failed(match status.code() {
            Some(code) => format!("{} exited with status {code}", step.program),
            None => format!("{} terminated by signal", step.program),
        }),
        Err(err) => StepStatus::Failed(format!("failed to wait for {}: {err}", step.program)),
    }
}

async fn kill_child(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
}
