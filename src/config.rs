//! Host-supplied configuration for one wizard session.
//!
//! A [Configuration] is built by the host application and handed to the
//! [Orchestrator](crate::presentation::orchestrator::Orchestrator) and the
//! [HttpTransport](crate::transport::HttpTransport) at construction time.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumString};

/// Default timeout for a single backend round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Languages the backend can render the wizard in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    De,
    En,
    Fr,
    It,
    Es,
}

impl Language {
    /// Picks the language for a locale identifier such as `en-GB` or `fr_CH`,
    /// falling back to German when the locale is unknown or absent.
    pub fn resolve(preferred_locale: Option<&str>) -> Self {
        preferred_locale
            .and_then(|locale| locale.get(..2))
            .and_then(|prefix| prefix.to_ascii_lowercase().parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the session key must not be empty")]
    MissingSessionKey,
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("base url must use http or https, found `{0}`")]
    UnsupportedScheme(String),
}

/// Configuration of one wizard session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    /// Opaque session key issued by the backend.
    pub session_key: String,
    /// Endpoint every request is posted to. There is no built-in default.
    pub base_url: String,
    pub language: Language,
    /// Whether `back` labels on submit and redirect lines produce a back button.
    pub enable_back_button: bool,
    /// Whether the user is offered to store login credentials on this device.
    pub offer_credential_storage: bool,
    /// Deep link the backend redirects to after an external bank app handoff.
    pub redirect_deep_link: Option<String>,
    /// URL prefixes of redirect targets that can be handed to a native bank app.
    pub native_handoff_prefixes: Vec<String>,
    /// Client identifier sent with the first request.
    pub client_version: String,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub style: StyleProvider,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            session_key: String::new(),
            base_url: String::new(),
            language: Language::default(),
            enable_back_button: true,
            offer_credential_storage: true,
            redirect_deep_link: None,
            native_handoff_prefixes: Vec::new(),
            client_version: format!("rust_sdk_{}", env!("CARGO_PKG_VERSION")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            style: StyleProvider::default(),
        }
    }
}

impl Configuration {
    pub fn new(session_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_back_button(mut self, enabled: bool) -> Self {
        self.enable_back_button = enabled;
        self
    }

    pub fn with_credential_storage(mut self, offer: bool) -> Self {
        self.offer_credential_storage = offer;
        self
    }

    pub fn with_redirect_deep_link(mut self, deep_link: impl Into<String>) -> Self {
        self.redirect_deep_link = Some(deep_link.into());
        self
    }

    pub fn with_native_handoff_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.native_handoff_prefixes.push(prefix.into());
        self
    }

    /// Checks the values that cannot be repaired later in the session.
    pub fn validate(&self) -> Result<(), Error> {
        if self.session_key.trim().is_empty() {
            return Err(Error::MissingSessionKey);
        }
        let url = url::Url::parse(&self.base_url)?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(Error::UnsupportedScheme(other.to_string())),
        }
    }

    /// A redirect may leave the SDK for the system browser or a bank app only
    /// when the target is on the handoff allow-list and a deep link back into
    /// the host app exists.
    pub fn allows_native_handoff(&self, url: &str) -> bool {
        self.redirect_deep_link.is_some()
            && self
                .native_handoff_prefixes
                .iter()
                .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

/// Look and feel values forwarded to the host renderer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleProvider {
    pub font: Option<String>,
    pub tint_color: String,
    pub logo_variation: LogoVariation,
    pub background_color: String,
    pub text_color: String,
    pub error_color: String,
    pub input_background_color: String,
    pub input_border_radius: f32,
    pub placeholder_color: String,
    pub button_border_radius: f32,
    pub submit_button: ButtonStyle,
    pub back_button: ButtonStyle,
    pub abort_button: ButtonStyle,
    pub restart_button: ButtonStyle,
    pub alert_border_radius: f32,
    pub error_style: AlertStyle,
    pub warning_style: AlertStyle,
    pub info_style: AlertStyle,
}

impl Default for StyleProvider {
    fn default() -> Self {
        let grey = ButtonStyle::new("#FFFFFF", "#BFBFBF");
        Self {
            font: None,
            tint_color: "#427783".into(),
            logo_variation: LogoVariation::Standard,
            background_color: "#FFFFFF".into(),
            text_color: "#262626".into(),
            error_color: "#DB271A".into(),
            input_background_color: "#F5F5F5".into(),
            input_border_radius: 6.0,
            placeholder_color: "#757575".into(),
            button_border_radius: 6.0,
            submit_button: ButtonStyle::new("#FFFFFF", "#427783"),
            back_button: grey.clone(),
            abort_button: grey.clone(),
            restart_button: grey,
            alert_border_radius: 6.0,
            error_style: AlertStyle::new("#FFFFFF", "#DB271A"),
            warning_style: AlertStyle::new("#000000", "#FEAE22"),
            info_style: AlertStyle::new("#FFFFFF", "#0B809D"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonStyle {
    pub text_color: String,
    pub background_color: String,
    #[serde(default)]
    pub border_width: f32,
    #[serde(default)]
    pub border_color: Option<String>,
}

impl ButtonStyle {
    pub fn new(text_color: &str, background_color: &str) -> Self {
        Self {
            text_color: text_color.into(),
            background_color: background_color.into(),
            border_width: 0.0,
            border_color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStyle {
    pub text_color: String,
    pub background_color: String,
}

impl AlertStyle {
    pub fn new(text_color: &str, background_color: &str) -> Self {
        Self {
            text_color: text_color.into(),
            background_color: background_color.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoVariation {
    #[default]
    Standard,
    White,
    Black,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
