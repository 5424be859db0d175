//! Live elements of the page currently on screen.
//!
//! Each decoded [FormLineDescriptor] becomes one [Element]. The element keeps
//! the descriptor's line for the host renderer and adds the state the user
//! can change: typed text, the selected option, the checked flag, the chosen
//! sub-form. Capabilities are expressed through the [ExposableFields] and
//! [LoginCredential] traits, which the element kinds implement as they apply.
use serde::Serialize;

use crate::definitions::form_line::{FormLine, FormLineDescriptor, GroupTag};
use crate::definitions::Payload;

pub mod action;
pub mod choice;
pub mod content;
pub mod input;
pub mod multi_form;

pub use action::{ActionButton, ActionKind, Activation, RedirectMode};
pub use choice::Choice;
pub use content::Content;
pub use input::Input;
pub use multi_form::MultiForm;

/// A required field left empty. Blocks the submission locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("field `{name}` is required")]
pub struct ValidationError {
    pub index: usize,
    pub name: String,
}

/// Elements contributing name/value pairs to the next request.
pub trait ExposableFields {
    /// Fields as currently shown on screen.
    fn exposed_fields(&self) -> Payload;

    /// Local check run before a validating action is sent.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Elements that may hold a login credential of the account provider.
pub trait LoginCredential {
    fn credential_name(&self) -> &str;

    fn is_login_credential(&self) -> bool;

    /// Fills the element from a stored credential.
    fn set_credential(&mut self, value: &str);

    /// The value worth storing, if the element holds one.
    fn credential_value(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum ElementKind {
    Input(Input),
    Choice(Choice),
    Action(ActionButton),
    Content(Content),
    MultiForm(MultiForm),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupTag>,
    pub visible: bool,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl From<FormLineDescriptor> for Element {
    fn from(descriptor: FormLineDescriptor) -> Self {
        let FormLineDescriptor { index, group, line } = descriptor;
        let kind = match line {
            FormLine::Text(_) | FormLine::Password(_) | FormLine::Captcha(_) | FormLine::Flicker(_) => {
                ElementKind::Input(Input::new(line))
            }
            FormLine::Select(line) => ElementKind::Choice(Choice::select(line)),
            FormLine::Radio(line) => ElementKind::Choice(Choice::radio(line)),
            FormLine::Checkbox(line) => ElementKind::Choice(Choice::checkbox(line)),
            FormLine::Multi(line) => ElementKind::MultiForm(MultiForm::new(line)),
            FormLine::Submit(_)
            | FormLine::Back(_)
            | FormLine::Restart(_)
            | FormLine::Abort(_)
            | FormLine::Redirect(_)
            | FormLine::Autosubmit(_)
            | FormLine::Tabs(_) => match ActionButton::new(line) {
                Ok(button) => ElementKind::Action(button),
                Err(line) => ElementKind::Content(Content::new(line)),
            },
            other => ElementKind::Content(Content::new(other)),
        };
        Self {
            index,
            group,
            visible: true,
            kind,
        }
    }
}

impl Element {
    pub fn exposable(&self) -> Option<&dyn ExposableFields> {
        match &self.kind {
            ElementKind::Input(input) => Some(input),
            ElementKind::Choice(choice) => Some(choice),
            ElementKind::MultiForm(multi) => Some(multi),
            ElementKind::Content(content) if content.is_hidden_field() => Some(content),
            _ => None,
        }
    }

    pub fn login_credential(&self) -> Option<&dyn LoginCredential> {
        match &self.kind {
            ElementKind::Input(input) => Some(input),
            ElementKind::Choice(choice @ Choice::Checkbox { .. }) => Some(choice),
            _ => None,
        }
    }

    pub fn login_credential_mut(&mut self) -> Option<&mut dyn LoginCredential> {
        match &mut self.kind {
            ElementKind::Input(input) => Some(input),
            ElementKind::Choice(choice @ Choice::Checkbox { .. }) => Some(choice),
            _ => None,
        }
    }

    /// A login credential outside any multi-form. Only these take part in
    /// autofill and credential storage.
    pub fn top_level_credential(&self) -> Option<&dyn LoginCredential> {
        if self.group.is_some() {
            return None;
        }
        self.login_credential()
            .filter(|credential| credential.is_login_credential())
    }

    /// Runs local validation, reporting the element's field name on failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.exposable() {
            Some(exposable) => exposable.validate().map_err(|name| ValidationError {
                index: self.index,
                name,
            }),
            None => Ok(()),
        }
    }

    pub fn is_focusable(&self) -> bool {
        matches!(&self.kind, ElementKind::Input(input) if input.accepts_keyboard())
    }

    pub fn as_input_mut(&mut self) -> Option<&mut Input> {
        match &mut self.kind {
            ElementKind::Input(input) => Some(input),
            _ => None,
        }
    }

    pub fn as_choice_mut(&mut self) -> Option<&mut Choice> {
        match &mut self.kind {
            ElementKind::Choice(choice) => Some(choice),
            _ => None,
        }
    }

    pub fn as_multi_form(&self) -> Option<&MultiForm> {
        match &self.kind {
            ElementKind::MultiForm(multi) => Some(multi),
            _ => None,
        }
    }

    pub fn as_multi_form_mut(&mut self) -> Option<&mut MultiForm> {
        match &mut self.kind {
            ElementKind::MultiForm(multi) => Some(multi),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&ActionButton> {
        match &self.kind {
            ElementKind::Action(button) => Some(button),
            _ => None,
        }
    }

    pub fn is_autosubmit(&self) -> bool {
        matches!(self.as_action(), Some(button) if button.autosubmit_interval().is_some())
    }
}

/// The elements of one page, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Page(Vec<Element>);

impl Page {
    pub fn new(descriptors: Vec<FormLineDescriptor>) -> Self {
        let mut page = Self(descriptors.into_iter().map(Element::from).collect());
        page.apply_visibility();
        page
    }

    pub fn elements(&self) -> &[Element] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.0.iter().find(|element| element.index == index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.0.iter_mut().find(|element| element.index == index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.0.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Selects `value` in the multi-form at `index` and re-applies group
    /// visibility. Returns `false` if there is no such multi-form or value.
    pub fn select_sub_form(&mut self, index: usize, value: &str) -> bool {
        let selected = self
            .get_mut(index)
            .and_then(Element::as_multi_form_mut)
            .map(|multi| multi.select(value))
            .unwrap_or(false);
        if selected {
            self.apply_visibility();
        }
        selected
    }

    /// An element is visible when it is ungrouped, or when its multi-form is
    /// visible and has its sub-form selected. Containers precede their
    /// children, so one pass in index order settles nested multi-forms.
    pub fn apply_visibility(&mut self) {
        let mut containers: Vec<(String, String, bool)> = Vec::new();
        for element in self.0.iter_mut() {
            element.visible = match &element.group {
                None => true,
                Some(group) => containers
                    .iter()
                    .rev()
                    .find(|(name, _, _)| *name == group.name)
                    .map(|(_, selected, visible)| *visible && *selected == group.value)
                    .unwrap_or(false),
            };
            if let Some(multi) = element.as_multi_form() {
                containers.push((
                    multi.name().to_string(),
                    multi.selected().to_string(),
                    element.visible,
                ));
            }
        }
    }

    /// Fields of every visible element. The first element exposing a name
    /// keeps it.
    pub fn serialize_form(&self) -> Payload {
        let mut payload = Payload::new();
        for exposable in self.visible().filter_map(Element::exposable) {
            payload.merge_keep_existing(exposable.exposed_fields().into_inner());
        }
        payload
    }

    /// Validation errors of the visible elements.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = self
            .visible()
            .filter_map(|element| element.validate().err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The next visible focusable element after `index`.
    pub fn next_focus(&self, index: usize) -> Option<usize> {
        self.visible()
            .filter(|element| element.index > index && element.is_focusable())
            .map(|element| element.index)
            .min()
    }

    pub fn autosubmit_interval(&self) -> Option<std::time::Duration> {
        self.iter()
            .filter_map(Element::as_action)
            .find_map(ActionButton::autosubmit_interval)
    }

    pub fn top_level_credentials(&self) -> impl Iterator<Item = &dyn LoginCredential> {
        self.iter().filter_map(Element::top_level_credential)
    }

    /// Whether the user ticked the store-credentials checkbox.
    pub fn store_credentials_checked(&self) -> bool {
        self.visible().any(|element| match &element.kind {
            ElementKind::Choice(choice) => choice.is_store_credentials() && choice.is_checked(),
            _ => false,
        })
    }

    /// Country of the bank search: the first select with a selection.
    pub fn country_id(&self) -> Option<&str> {
        self.iter().find_map(|element| match &element.kind {
            ElementKind::Choice(choice) => choice.selected_id(),
            _ => None,
        })
    }

    fn visible(&self) -> impl Iterator<Item = &Element> {
        self.0.iter().filter(|element| element.visible)
    }
}
