//! Decoded form lines.
//!
//! A [FormLineDescriptor] is the backend-agnostic shape of one line of the
//! wizard page. The payload is a closed sum type over every line kind the
//! backend can send, plus the synthetic `back` button produced from the `back`
//! label of submit and redirect lines.
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use super::helpers::{NonEmptyVec, RadioOption, SelectOptions};

/// Name of the checkbox that is treated as a login credential.
pub const PRIVACY_POLICY: &str = "privacy_policy";
/// Name of the synthetic checkbox offering to store login credentials.
pub const STORE_CREDENTIALS: &str = "store_credentials";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LineType {
    Text,
    Select,
    Description,
    Submit,
    Back,
    Restart,
    Abort,
    Paragraph,
    Checkbox,
    Autosubmit,
    Password,
    Captcha,
    Redirect,
    Radio,
    Flicker,
    Hidden,
    Multi,
    Image,
    Tabs,
    Logo,
}

/// Membership of a line in one sub-form of a multi-form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupTag {
    /// Name of the multi-form.
    pub name: String,
    /// Value of the sub-form within the multi-form.
    pub value: String,
}

impl GroupTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormLineDescriptor {
    /// Position in document order across the whole page, nested lines included.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupTag>,
    #[serde(flatten)]
    pub line: FormLine,
}

impl FormLineDescriptor {
    pub fn line_type(&self) -> LineType {
        self.line.line_type()
    }

    /// Whether the line is grouped and belongs to `name`.
    pub fn in_group(&self, name: &str) -> bool {
        matches!(&self.group, Some(group) if group.name == name)
    }

    /// A login credential outside any multi-form.
    pub fn is_top_level_credential(&self) -> bool {
        self.group.is_none() && self.line.is_login_credential()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormLine {
    Text(TextLine),
    Password(PasswordLine),
    Captcha(CaptchaLine),
    Flicker(FlickerLine),
    Select(SelectLine),
    Radio(RadioLine),
    Checkbox(CheckboxLine),
    Paragraph(ParagraphLine),
    Description(DescriptionLine),
    Submit(SubmitLine),
    Back(ButtonLine),
    Restart(ButtonLine),
    Abort(ButtonLine),
    Redirect(RedirectLine),
    Autosubmit(AutosubmitLine),
    Hidden(HiddenLine),
    Image(ImageLine),
    Tabs(TabsLine),
    Logo,
    Multi(MultiLine),
}

impl FormLine {
    pub fn line_type(&self) -> LineType {
        match self {
            FormLine::Text(_) => LineType::Text,
            FormLine::Password(_) => LineType::Password,
            FormLine::Captcha(_) => LineType::Captcha,
            FormLine::Flicker(_) => LineType::Flicker,
            FormLine::Select(_) => LineType::Select,
            FormLine::Radio(_) => LineType::Radio,
            FormLine::Checkbox(_) => LineType::Checkbox,
            FormLine::Paragraph(_) => LineType::Paragraph,
            FormLine::Description(_) => LineType::Description,
            FormLine::Submit(_) => LineType::Submit,
            FormLine::Back(_) => LineType::Back,
            FormLine::Restart(_) => LineType::Restart,
            FormLine::Abort(_) => LineType::Abort,
            FormLine::Redirect(_) => LineType::Redirect,
            FormLine::Autosubmit(_) => LineType::Autosubmit,
            FormLine::Hidden(_) => LineType::Hidden,
            FormLine::Image(_) => LineType::Image,
            FormLine::Tabs(_) => LineType::Tabs,
            FormLine::Logo => LineType::Logo,
            FormLine::Multi(_) => LineType::Multi,
        }
    }

    /// Name of the field this line contributes, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            FormLine::Text(TextLine { name, .. })
            | FormLine::Password(PasswordLine { name, .. })
            | FormLine::Captcha(CaptchaLine { name, .. })
            | FormLine::Flicker(FlickerLine { name, .. })
            | FormLine::Select(SelectLine { name, .. })
            | FormLine::Radio(RadioLine { name, .. })
            | FormLine::Checkbox(CheckboxLine { name, .. })
            | FormLine::Hidden(HiddenLine { name, .. })
            | FormLine::Multi(MultiLine { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Label of the back button announced by a submit or redirect line.
    pub fn back_label(&self) -> Option<&str> {
        match self {
            FormLine::Submit(SubmitLine { back, .. })
            | FormLine::Redirect(RedirectLine { back, .. }) => back.as_deref(),
            _ => None,
        }
    }

    /// Text-like lines take part in return-key focus traversal.
    pub fn is_focusable(&self) -> bool {
        matches!(
            self,
            FormLine::Text(_) | FormLine::Password(_) | FormLine::Captcha(_) | FormLine::Flicker(_)
        )
    }

    pub fn is_login_credential(&self) -> bool {
        match self {
            FormLine::Text(line) => line.login_credential,
            FormLine::Password(line) => line.login_credential,
            FormLine::Checkbox(line) => line.login_credential,
            _ => false,
        }
    }

    pub fn validation(&self) -> Option<&Validation> {
        match self {
            FormLine::Text(TextLine { validation, .. })
            | FormLine::Password(PasswordLine { validation, .. })
            | FormLine::Captcha(CaptchaLine { validation, .. })
            | FormLine::Flicker(FlickerLine { validation, .. })
            | FormLine::Select(SelectLine { validation, .. })
            | FormLine::Radio(RadioLine { validation, .. })
            | FormLine::Checkbox(CheckboxLine { validation, .. }) => Some(validation),
            _ => None,
        }
    }
}

/// Validation state sent by the backend for an input line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub invalid: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What an input line shows next to itself. An error always wins over the
/// required marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Decoration {
    None,
    Required,
    Error(Option<String>),
}

impl Validation {
    pub fn decoration(&self) -> Decoration {
        if self.invalid {
            Decoration::Error(self.message.clone())
        } else if self.required {
            Decoration::Required
        } else {
            Decoration::None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextLine {
    pub name: String,
    pub label: String,
    pub value: String,
    pub placeholder: String,
    pub disabled: bool,
    /// Action sent along when the field is filled through the bank search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete_action: Option<String>,
    pub login_credential: bool,
    pub validation: Validation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasswordLine {
    pub name: String,
    pub label: String,
    pub placeholder: String,
    pub disabled: bool,
    pub login_credential: bool,
    pub validation: Validation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptchaLine {
    pub name: String,
    pub label: String,
    pub placeholder: String,
    pub image: ImageSource,
    pub validation: Validation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlickerLine {
    pub name: String,
    pub label: String,
    /// Frames of the optical TAN, one row per frame.
    pub code: Vec<Vec<i64>>,
    pub validation: Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectLine {
    pub name: String,
    pub label: String,
    pub selected: String,
    pub options: SelectOptions,
    pub validation: Validation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadioLine {
    pub name: String,
    pub label: String,
    pub checked: usize,
    pub options: Vec<RadioOption>,
    pub validation: Validation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckboxRole {
    /// A regular form field.
    #[default]
    Field,
    /// Inserted by the client to ask whether credentials may be stored.
    StoreCredentials,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckboxLine {
    pub name: String,
    pub label: String,
    pub checked: bool,
    pub disabled: bool,
    pub login_credential: bool,
    pub role: CheckboxRole,
    pub validation: Validation,
}

impl CheckboxLine {
    /// The checkbox offered next to login credentials.
    pub fn store_credentials() -> Self {
        Self {
            name: STORE_CREDENTIALS.to_string(),
            label: "Store login credentials on this device".to_string(),
            role: CheckboxRole::StoreCredentials,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParagraphLine {
    pub title: String,
    pub text: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescriptionLine {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ButtonLine {
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmitLine {
    pub label: String,
    /// Label of the back button offered next to this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedirectLine {
    pub label: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutosubmitLine {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HiddenLine {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageLine {
    pub image: ImageSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabsLine {
    pub selected: String,
    /// `(key, label)` pairs in wire order.
    pub tabs: Vec<(String, String)>,
}

/// One selectable sub-form of a multi-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubForm {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiLine {
    pub name: String,
    /// The selected sub-form value. Falls back to the first sub-form when
    /// the backend selection names none of them.
    pub selected: String,
    pub forms: NonEmptyVec<SubForm>,
}

/// Image payload as sent by the backend, usually a `data:` URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageSource(pub String);

impl ImageSource {
    /// Decodes the base64 body of the image. Returns `None` for anything that
    /// is not base64.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        let body = match self.0.strip_prefix("data:") {
            Some(uri) => {
                let (header, body) = uri.split_once(',')?;
                if !header.ends_with(";base64") {
                    return None;
                }
                body
            }
            None => self.0.as_str(),
        };
        base64::decode(body.trim()).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_takes_precedence_over_required() {
        let validation = Validation {
            invalid: true,
            required: true,
            message: Some("Please check your input".into()),
        };
        assert_eq!(
            validation.decoration(),
            Decoration::Error(Some("Please check your input".into()))
        );

        let validation = Validation {
            required: true,
            ..Default::default()
        };
        assert_eq!(validation.decoration(), Decoration::Required);
        assert_eq!(Validation::default().decoration(), Decoration::None);
    }

    #[test]
    fn image_data_uri() {
        let image = ImageSource("data:image/png;base64,iVBORw0KGgo=".into());
        assert_eq!(
            image.bytes().unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
        );
        assert!(ImageSource("data:image/svg+xml,<svg/>".into())
            .bytes()
            .is_none());
    }

    #[test]
    fn descriptor_serializes_flat() {
        let descriptor = FormLineDescriptor {
            index: 3,
            group: Some(GroupTag::new("login_type", "pin")),
            line: FormLine::Hidden(HiddenLine {
                name: "session".into(),
                value: "x".into(),
            }),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 3,
                "group": {"name": "login_type", "value": "pin"},
                "type": "hidden",
                "name": "session",
                "value": "x"
            })
        );
    }
}
