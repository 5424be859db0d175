//! Secure credential storage consumed by the session.
//!
//! Checking whether a credential exists never involves the user, reading it
//! may require a biometric prompt. The two are separate operations of
//! [SecureStore].
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Reason shown by the platform when a stored credential is read.
pub const FETCH_PROMPT: &str = "Fill in your stored login credentials";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("user dismissed the authentication prompt")]
    Cancelled,
    #[error("secure storage failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Readable without user interaction.
    Available,
    /// Present, reading needs the user to authenticate.
    RequiresPrompt,
    Absent,
}

impl Availability {
    /// Availability of a set of keys: present when any key is, prompting when
    /// any present key needs it.
    pub fn combine(items: impl IntoIterator<Item = Availability>) -> Self {
        items
            .into_iter()
            .fold(Availability::Absent, |acc, item| match (acc, item) {
                (Availability::RequiresPrompt, _) | (_, Availability::RequiresPrompt) => {
                    Availability::RequiresPrompt
                }
                (Availability::Available, _) | (_, Availability::Available) => {
                    Availability::Available
                }
                _ => Availability::Absent,
            })
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Availability::Absent)
    }
}

/// Key under which the credential field `name` of `provider` is stored.
pub fn credential_key(provider: &str, name: &str) -> String {
    format!("{provider}_{name}")
}

#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn probe(&self, key: &str) -> Availability;

    /// Reads `key`, prompting the user with `prompt` if the platform needs to.
    async fn fetch(&self, key: &str, prompt: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    async fn remove_all(&self) -> Result<(), Error>;
}

/// Probes every key and combines the answers.
pub async fn probe_all(store: &dyn SecureStore, keys: &[String]) -> Availability {
    let mut answers = Vec::with_capacity(keys.len());
    for key in keys {
        answers.push(store.probe(key).await);
    }
    Availability::combine(answers)
}

/// Fetches every present key. Keys without a value are left out.
pub async fn fetch_all(
    store: &dyn SecureStore,
    keys: &[String],
) -> Result<Vec<(String, String)>, Error> {
    let mut values = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = store.fetch(key, FETCH_PROMPT).await? {
            values.push((key.clone(), value));
        }
    }
    Ok(values)
}

/// In-process store, for tests and hosts without a platform keychain.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
    require_prompt: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose reads are reported as needing a prompt.
    pub fn with_prompt() -> Self {
        Self {
            require_prompt: true,
            ..Default::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn probe(&self, key: &str) -> Availability {
        match self.entries.lock().await.contains_key(key) {
            false => Availability::Absent,
            true if self.require_prompt => Availability::RequiresPrompt,
            true => Availability::Available,
        }
    }

    async fn fetch(&self, key: &str, _prompt: &str) -> Result<Option<String>, Error> {
        Ok(self
            .entries
            .lock()
            .await
            .get(key)
            .map(|value| value.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), Error> {
        self.entries.lock().await.clear();
        Ok(())
    }
}
