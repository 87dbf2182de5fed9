use anyhow::Result;
use recond_model::ServerMessage;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One connected dashboard client.
///
/// A session holds no job or scope data of its own: only the project it is
/// bound to, the outbound message channel, and the forwarder task that
/// relays that project's job events into the channel.
pub struct Session {
    /// Unique connection ID
    pub id: Uuid,
    /// Project this session is bound to; set by the first status/start
    /// message and replaced when the client switches projects.
    project: RwLock<Option<String>>,
    /// Channel to send messages to this connection
    sender: mpsc::Sender<ServerMessage>,
    /// Task relaying job events for the bound project.
    forwarder: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: RwLock::new(None),
            sender,
            forwarder: parking_lot::Mutex::new(None),
        }
    }

    /// Send a message to this connection
    pub async fn send(&self, message: ServerMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("Failed to send message: channel closed"))
    }

    pub async fn project(&self) -> Option<String> {
        self.project.read().await.clone()
    }

    pub async fn set_project(&self, project: Option<String>) {
        *self.project.write().await = project;
    }

    /// Installs a new forwarder task, aborting the previous one.
    pub fn replace_forwarder(&self, handle: Option<JoinHandle<()>>) {
        let previous = {
            let mut guard = self.forwarder.lock();
            std::mem::replace(&mut *guard, handle)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Tears the session down; called on disconnect.
    pub fn shutdown(&self) {
        self.replace_forwarder(None);
    }
}
