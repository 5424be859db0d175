use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use xs2a_wizard::config::Configuration;
use xs2a_wizard::definitions::Payload;
use xs2a_wizard::presentation::storage::SecureStore;
use xs2a_wizard::presentation::{Completion, Session, SessionHandle, Update};
use xs2a_wizard::transport::{self, Transport};

#[allow(dead_code)]
fn main() {}

/// Scripted answer of [ScriptedTransport].
#[allow(dead_code)]
pub enum Reply {
    Body(Vec<u8>),
    Fail(transport::Error),
    /// Never answers, the request only ends when its task is aborted.
    Hang,
}

/// Answers requests in order from a script and records what was sent.
/// Requests beyond the script hang.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<Payload>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, payload: &Payload) -> Result<Vec<u8>, transport::Error> {
        self.sent.lock().unwrap().push(payload.clone());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Hang);
        match reply {
            Reply::Body(body) => Ok(body),
            Reply::Fail(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Response body from `tests/data`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Result<Reply> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    let body = std::fs::read(&path).with_context(|| format!("could not read {name}"))?;
    Ok(Reply::Body(body))
}

#[allow(dead_code)]
pub fn config() -> Configuration {
    Configuration::new("test-session-key", "https://api.example.com/jsonp")
}

/// Starts a session on its own task.
#[allow(dead_code)]
pub fn spawn_session(
    transport: Arc<ScriptedTransport>,
    store: Arc<dyn SecureStore>,
) -> Result<(
    JoinHandle<Completion>,
    SessionHandle,
    mpsc::UnboundedReceiver<Update>,
)> {
    let (session, handle, updates) =
        Session::new(config(), transport, store).context("could not create session")?;
    Ok((tokio::spawn(session.run()), handle, updates))
}

/// Waits for the first update `select` accepts, skipping the others.
#[allow(dead_code)]
pub async fn wait_for<T>(
    updates: &mut mpsc::UnboundedReceiver<Update>,
    mut select: impl FnMut(Update) -> Option<T>,
) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(update) = updates.recv().await {
            if let Some(found) = select(update) {
                return Ok(found);
            }
        }
        Err(anyhow!("session ended before the expected update"))
    })
    .await
    .context("timed out waiting for an update")?
}

/// Waits for the next rendered page and returns its element count.
#[allow(dead_code)]
pub async fn next_page(updates: &mut mpsc::UnboundedReceiver<Update>) -> Result<usize> {
    wait_for(updates, |update| match update {
        Update::Render { page, .. } => Some(page.elements().len()),
        _ => None,
    })
    .await
}
