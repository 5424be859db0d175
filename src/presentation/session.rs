//! Tokio driver of an [Orchestrator].
//!
//! The session owns the state machine and runs it on a single task. Requests,
//! timers and storage reads are spawned and post their results back into the
//! session's event channel, so the orchestrator is only ever touched from
//! [Session::run].
//!
//! ```ignore
//! let (session, handle, mut updates) = Session::with_http(config, store)?;
//! let completion = tokio::spawn(session.run());
//! while let Some(update) = updates.recv().await {
//!     // render pages, forward user input through `handle`
//! }
//! ```
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::autocomplete::SEARCH_DEBOUNCE;
use super::elements::Page;
use super::orchestrator::{Completion, Effect, Event, HostEvent, Orchestrator, UserAction};
use super::storage::{self, SecureStore};
use crate::config::{self, Configuration};
use crate::transport::{envelope, http, HttpTransport, Sealer, Transport};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Setup(#[from] http::SetupError),
    #[error("backend key could not be loaded: {0}")]
    Key(#[from] envelope::Error),
    #[error("session has ended")]
    Ended,
}

/// What the host renders or reacts to.
#[derive(Debug, Clone)]
pub enum Update {
    Render { page: Page, animated: bool },
    Loading(bool),
    Focus(Option<usize>),
    Host(HostEvent),
    /// Last update of the session.
    Completed(Completion),
}

/// Feeds host input into a running [Session].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    pub fn send(&self, event: Event) -> Result<(), Error> {
        self.events.send(event).map_err(|_| Error::Ended)
    }

    pub fn user(&self, action: UserAction) -> Result<(), Error> {
        self.send(Event::User(action))
    }
}

pub struct Session {
    orchestrator: Orchestrator,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SecureStore>,
    events: mpsc::UnboundedSender<Event>,
    inbox: mpsc::UnboundedReceiver<Event>,
    updates: mpsc::UnboundedSender<Update>,
    request: Option<JoinHandle<()>>,
    search: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        config: Configuration,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SecureStore>,
    ) -> Result<(Self, SessionHandle, mpsc::UnboundedReceiver<Update>), Error> {
        config.validate()?;
        let (events, inbox) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            events: events.clone(),
        };
        let session = Self {
            orchestrator: Orchestrator::new(config),
            transport,
            store,
            events,
            inbox,
            updates,
            request: None,
            search: None,
            timer: None,
        };
        Ok((session, handle, updates_rx))
    }

    /// Session talking to the production backend over HTTP.
    pub fn with_http(
        config: Configuration,
        store: Arc<dyn SecureStore>,
    ) -> Result<(Self, SessionHandle, mpsc::UnboundedReceiver<Update>), Error> {
        let transport = HttpTransport::new(&config, Sealer::backend()?)?;
        Self::new(config, Arc::new(transport), store)
    }

    /// Runs the session to its end. The completion is also delivered as the
    /// last [Update].
    pub async fn run(mut self) -> Completion {
        let span = tracing::info_span!("session", id = %Uuid::new_v4());
        async move {
            let effects = self.orchestrator.start();
            if let Some(completion) = self.apply(effects).await {
                return completion;
            }
            while let Some(event) = self.inbox.recv().await {
                let effects = self.orchestrator.handle(event);
                if let Some(completion) = self.apply(effects).await {
                    return completion;
                }
            }
            // The session holds a sender itself, the channel cannot close.
            tracing::error!("event channel closed");
            Completion::NetworkError
        }
        .instrument(span)
        .await
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Option<Completion> {
        for effect in effects {
            match effect {
                Effect::Send {
                    generation,
                    payload,
                } => {
                    let transport = self.transport.clone();
                    let events = self.events.clone();
                    self.request = Some(tokio::spawn(async move {
                        let result = transport.send(&payload).await;
                        let _ = events.send(Event::Response { generation, result });
                    }));
                }
                Effect::Search {
                    generation,
                    payload,
                } => {
                    // Typing on supersedes the search still waiting or running.
                    abort(&mut self.search);
                    let transport = self.transport.clone();
                    let events = self.events.clone();
                    self.search = Some(tokio::spawn(async move {
                        tokio::time::sleep(SEARCH_DEBOUNCE).await;
                        let result = transport.send(&payload).await;
                        let _ = events.send(Event::SearchResponse { generation, result });
                    }));
                }
                Effect::Cancel => {
                    tracing::debug!("aborting request task");
                    abort(&mut self.request);
                }
                Effect::StartTimer { page, after } => {
                    self.clear_timer();
                    let events = self.events.clone();
                    self.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = events.send(Event::TimerFired { page });
                    }));
                }
                Effect::ClearTimer => self.clear_timer(),
                Effect::Loading(loading) => self.publish(Update::Loading(loading)),
                Effect::Render { animated } => self.publish(Update::Render {
                    page: self.orchestrator.page().clone(),
                    animated,
                }),
                Effect::Focus(index) => self.publish(Update::Focus(index)),
                Effect::Host(event) => self.publish(Update::Host(event)),
                Effect::ProbeCredentials { page, keys } => {
                    let store = self.store.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let availability = storage::probe_all(store.as_ref(), &keys).await;
                        let _ = events.send(Event::CredentialsProbed { page, availability });
                    });
                }
                Effect::FetchCredentials { page, keys } => {
                    let store = self.store.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = storage::fetch_all(store.as_ref(), &keys).await;
                        let _ = events.send(Event::CredentialsFetched { page, result });
                    });
                }
                Effect::StoreCredentials { entries } => {
                    for (key, value) in entries {
                        if let Err(e) = self.store.set(&key, &value).await {
                            tracing::warn!("credential `{key}` could not be stored: {e}");
                        }
                    }
                }
                Effect::Complete(completion) => {
                    self.shutdown();
                    tracing::info!(success = completion.is_success(), "session completed");
                    self.publish(Update::Completed(completion.clone()));
                    return Some(completion);
                }
            }
        }
        None
    }

    fn clear_timer(&mut self) {
        abort(&mut self.timer);
    }

    fn shutdown(&mut self) {
        abort(&mut self.request);
        abort(&mut self.search);
        abort(&mut self.timer);
    }

    fn publish(&self, update: Update) {
        if self.updates.send(update).is_err() {
            tracing::debug!("host stopped listening for updates");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Aborts a spawned task. A task that has not been polled yet never runs.
fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
