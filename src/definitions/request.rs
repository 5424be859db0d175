//! Request payloads sent to the backend, before encryption.
use serde::Serialize;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::config::Language;

/// Reserved key carrying the action of a request.
pub const ACTION_KEY: &str = "action";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    Submit,
    Back,
    Restart,
    Autosubmit,
    SwitchLoginTabs,
    PostCode,
    ChangeLanguage,
    CompleteBankcodes,
}

/// Flat string-keyed request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body of the first request of a session.
    pub fn initial(client_version: &str, language: Language, location: Option<&str>) -> Self {
        let mut payload = Self::new()
            .with("version", client_version)
            .with("client", client_name(client_version))
            .with("language", language.as_ref());
        if let Some(location) = location {
            payload.insert("location", location);
        }
        payload
    }

    pub fn change_language(language: Language) -> Self {
        Self::new()
            .with_action(Action::ChangeLanguage)
            .with("language", language.as_ref())
    }

    /// Body of the request issued after connectivity returns. It has no
    /// action, so the backend only answers with the current page.
    pub fn resync() -> Self {
        Self::new()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_action(self, action: Action) -> Self {
        self.with(ACTION_KEY, action.as_ref())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Merges `other` into this payload, `other` wins on key collisions.
    pub fn merge(&mut self, other: Payload) {
        self.0.extend(other.0);
    }

    /// Merges `other`, keeping values already present.
    pub fn merge_keep_existing(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.0.entry(key).or_insert(value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn action(&self) -> Option<&str> {
        self.0.get(ACTION_KEY).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
    }
}

/// `rust_sdk_1.2.0` identifies itself as client `rust_sdk`.
fn client_name(client_version: &str) -> &str {
    client_version
        .rsplit_once('_')
        .map(|(name, _)| name)
        .unwrap_or(client_version)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_names() {
        assert_eq!(Action::SwitchLoginTabs.as_ref(), "switch-login-tabs");
        assert_eq!(Action::PostCode.as_ref(), "post-code");
        assert_eq!(Action::CompleteBankcodes.as_ref(), "complete-bankcodes");
        assert_eq!("autosubmit".parse::<Action>().unwrap(), Action::Autosubmit);
    }

    #[test]
    fn initial_payload() {
        let payload = Payload::initial("rust_sdk_0.1.0", Language::En, Some("app://back"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "version": "rust_sdk_0.1.0",
                "client": "rust_sdk",
                "language": "en",
                "location": "app://back"
            })
        );
        assert!(payload.action().is_none());
    }

    #[test]
    fn merge_overrides() {
        let mut payload = Payload::new().with("a", "1").with("b", "2");
        payload.merge(Payload::new().with("b", "3"));
        payload.merge_keep_existing(Payload::new().with("a", "9").with("c", "4").into_inner());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"a": "1", "b": "3", "c": "4"})
        );
    }
}
