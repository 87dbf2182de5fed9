use serde::{Deserialize, Serialize};

/// Control actions a client may send over the recon stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Status,
    Start,
    Pause,
    Resume,
    Stop,
}

/// An inbound WebSocket control message: `{action, project, modules?}`.
///
/// `modules` is only meaningful for `start`. Unknown actions fail to
/// deserialize, which the gateway reports as a malformed message without
/// touching job state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub action: ClientAction,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

/// An outbound WebSocket message: `{log?, progress?, status?}`.
///
/// Log payloads are incremental: one line per message after the initial
/// `status` reply, which carries the buffered log tail as a single blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ServerMessage {
    pub fn log(line: impl Into<String>) -> Self {
        Self {
            log: Some(line.into()),
            ..Self::default()
        }
    }

    pub fn progress(progress: impl Into<String>) -> Self {
        Self {
            progress: Some(progress.into()),
            ..Self::default()
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn log_with_status(log: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            log: Some(log.into()),
            status: Some(status.into()),
            ..Self::default()
        }
    }
}
