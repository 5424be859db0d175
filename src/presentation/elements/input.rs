use serde::Serialize;

use super::{ExposableFields, LoginCredential};
use crate::definitions::form_line::{FormLine, Validation};
use crate::definitions::request::ACTION_KEY;
use crate::definitions::Payload;

/// A keyboard field: text, password, captcha or flicker TAN entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Input {
    pub line: FormLine,
    /// Current text of the field.
    pub value: String,
}

impl Input {
    /// `line` is expected to be one of the four text-like lines, anything else
    /// yields an input without name that exposes nothing.
    pub fn new(line: FormLine) -> Self {
        let value = match &line {
            FormLine::Text(text) => text.value.clone(),
            _ => String::new(),
        };
        Self { line, value }
    }

    pub fn name(&self) -> &str {
        self.line.name().unwrap_or_default()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Action of the bank search behind this field.
    pub fn autocomplete_action(&self) -> Option<&str> {
        match &self.line {
            FormLine::Text(text) => text.autocomplete_action.as_deref(),
            _ => None,
        }
    }

    /// Fields backed by the bank search take no keyboard input.
    pub fn accepts_keyboard(&self) -> bool {
        !self.is_disabled() && self.autocomplete_action().is_none()
    }

    pub fn is_disabled(&self) -> bool {
        match &self.line {
            FormLine::Text(text) => text.disabled,
            FormLine::Password(password) => password.disabled,
            _ => false,
        }
    }

    pub fn validation(&self) -> Option<&Validation> {
        self.line.validation()
    }
}

impl ExposableFields for Input {
    fn exposed_fields(&self) -> Payload {
        let mut payload = Payload::new();
        // Some text lines come without a name.
        if !self.name().is_empty() {
            payload.insert(self.name(), self.value.as_str());
        }
        if let Some(action) = self.autocomplete_action() {
            payload.insert(ACTION_KEY, action);
        }
        payload
    }

    fn validate(&self) -> Result<(), String> {
        let required = self.validation().map(|v| v.required).unwrap_or(false);
        if required && self.value.trim().is_empty() {
            return Err(self.name().to_string());
        }
        Ok(())
    }
}

impl LoginCredential for Input {
    fn credential_name(&self) -> &str {
        self.name()
    }

    fn is_login_credential(&self) -> bool {
        self.line.is_login_credential()
    }

    fn set_credential(&mut self, value: &str) {
        self.set_value(value);
    }

    fn credential_value(&self) -> Option<String> {
        Some(self.value.clone()).filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::form_line::{CaptchaLine, PasswordLine, TextLine};

    fn text(name: &str, value: &str) -> Input {
        Input::new(FormLine::Text(TextLine {
            name: name.into(),
            value: value.into(),
            login_credential: true,
            ..Default::default()
        }))
    }

    #[test]
    fn exposes_current_text() {
        let mut input = text("USER_NAME", "prefilled");
        assert_eq!(
            input.exposed_fields().get("USER_NAME"),
            Some(&"prefilled".into())
        );
        input.set_value("jane");
        assert_eq!(input.exposed_fields().get("USER_NAME"), Some(&"jane".into()));
    }

    #[test]
    fn nameless_text_exposes_nothing() {
        assert!(text("", "x").exposed_fields().is_empty());
    }

    #[test]
    fn bank_search_field() {
        let input = Input::new(FormLine::Text(TextLine {
            name: "bank_code".into(),
            autocomplete_action: Some("complete-bankcodes".into()),
            ..Default::default()
        }));
        assert!(!input.accepts_keyboard());
        let fields = input.exposed_fields();
        assert_eq!(fields.action(), Some("complete-bankcodes"));
        assert_eq!(fields.get("bank_code"), Some(&"".into()));
    }

    #[test]
    fn required_field_must_not_be_blank() {
        let mut input = Input::new(FormLine::Password(PasswordLine {
            name: "USER_PIN".into(),
            validation: Validation {
                required: true,
                ..Default::default()
            },
            ..Default::default()
        }));
        assert_eq!(input.validate(), Err("USER_PIN".to_string()));
        input.set_value("   ");
        assert!(input.validate().is_err());
        input.set_value("1234");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn credentials() {
        let mut input = text("USER_NAME", "");
        assert!(input.is_login_credential());
        assert_eq!(input.credential_value(), None);
        input.set_credential("jane");
        assert_eq!(input.credential_value().as_deref(), Some("jane"));

        let captcha = Input::new(FormLine::Captcha(CaptchaLine::default()));
        assert!(!captcha.is_login_credential());
    }
}
