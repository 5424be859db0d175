//! Classified backend responses.
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use super::form_line::FormLineDescriptor;

/// Logical stage of the wizard as declared by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WizardStep {
    Bank,
    Login,
    LoginNext,
    Tan,
    Sca,
    Accounts,
    LoadingAccounts,
    Data,
    Intermission,
    PreLogin,
    PreAccounts,
    PreData,
    Finish,
    #[strum(default)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionErrorKind {
    /// Login to the bank failed, e.g. wrong credentials.
    LoginFailed,
    SessionTimeout,
    /// The entered TAN was rejected.
    TanFailed,
    TechError,
    TestmodeError,
    /// The transaction cannot be carried out.
    TransNotPossible,
    ValidationFailed,
    #[strum(default)]
    Other(String),
}

impl SessionErrorKind {
    /// Maps a wire error code, unknown codes become [SessionErrorKind::Other].
    pub fn from_code(code: &str) -> Self {
        // `strum(default)` makes parsing infallible.
        code.parse()
            .unwrap_or_else(|_| SessionErrorKind::Other(code.to_string()))
    }
}

/// A non-fatal error reported by the backend alongside the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("session error {kind} (recoverable: {recoverable})")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub recoverable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Finished,
    FinishedWithCredential {
        credential: String,
    },
    /// Error and form lines are not exclusive, the page still has to be shown.
    SessionError {
        error: SessionError,
        lines: Vec<FormLineDescriptor>,
    },
    FormLines {
        lines: Vec<FormLineDescriptor>,
    },
}

impl Classification {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Classification::Finished | Classification::FinishedWithCredential { .. }
        )
    }

    pub fn lines(&self) -> &[FormLineDescriptor] {
        match self {
            Classification::SessionError { lines, .. } | Classification::FormLines { lines } => {
                lines
            }
            _ => &[],
        }
    }
}

/// A decoded response: its classification plus the session metadata it
/// carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub classification: Classification,
    /// Raw `callback` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<WizardStep>,
    /// Normalized `step` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_step: Option<WizardStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Namespace for stored credentials, announced in `callbackParams`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether the last submit or redirect line carried a `back` label.
    pub back_button_present: bool,
}
