use serde::Serialize;

use super::{ExposableFields, LoginCredential};
use crate::definitions::form_line::{CheckboxLine, CheckboxRole, RadioLine, SelectLine, Validation};
use crate::definitions::helpers::markup::{self, Segment};
use crate::definitions::Payload;

/// Value a checked checkbox submits.
pub const CHECKED: &str = "on";

/// Lines where the user picks among fixed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum Choice {
    Select {
        line: SelectLine,
        /// Id of the selected option. The placeholder row is never selected.
        selected: Option<String>,
    },
    Radio {
        line: RadioLine,
        checked: usize,
    },
    Checkbox {
        line: CheckboxLine,
        checked: bool,
        segments: Vec<Segment>,
    },
}

impl Choice {
    pub fn select(line: SelectLine) -> Self {
        let selected = Some(line.selected.clone()).filter(|id| line.options.is_selectable(id));
        Choice::Select { line, selected }
    }

    pub fn radio(line: RadioLine) -> Self {
        let checked = line.checked;
        Choice::Radio { line, checked }
    }

    pub fn checkbox(line: CheckboxLine) -> Self {
        let checked = line.checked;
        let segments = markup::parse(&line.label);
        Choice::Checkbox {
            line,
            checked,
            segments,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Choice::Select { line, .. } => &line.name,
            Choice::Radio { line, .. } => &line.name,
            Choice::Checkbox { line, .. } => &line.name,
        }
    }

    fn validation(&self) -> &Validation {
        match self {
            Choice::Select { line, .. } => &line.validation,
            Choice::Radio { line, .. } => &line.validation,
            Choice::Checkbox { line, .. } => &line.validation,
        }
    }

    /// Selects the option `id` of a select line. Disabled rows and unknown ids
    /// are refused.
    pub fn pick(&mut self, id: &str) -> bool {
        match self {
            Choice::Select { line, selected } if line.options.is_selectable(id) => {
                *selected = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Checks option `position` of a radio line unless it is disabled.
    pub fn check_option(&mut self, position: usize) -> bool {
        match self {
            Choice::Radio { line, checked } => match line.options.get(position) {
                Some(option) if !option.disabled => {
                    *checked = position;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Flips a checkbox unless it is disabled. Returns the new state.
    pub fn toggle(&mut self) -> Option<bool> {
        match self {
            Choice::Checkbox { line, checked, .. } if !line.disabled => {
                *checked = !*checked;
                Some(*checked)
            }
            _ => None,
        }
    }

    pub fn is_checked(&self) -> bool {
        matches!(self, Choice::Checkbox { checked: true, .. })
    }

    pub fn is_store_credentials(&self) -> bool {
        matches!(self, Choice::Checkbox { line, .. } if line.role == CheckboxRole::StoreCredentials)
    }

    pub fn selected_id(&self) -> Option<&str> {
        match self {
            Choice::Select { selected, .. } => selected.as_deref(),
            _ => None,
        }
    }
}

impl ExposableFields for Choice {
    fn exposed_fields(&self) -> Payload {
        match self {
            Choice::Select { line, selected } => Payload::new().with(
                &line.name,
                selected.as_deref().unwrap_or_default(),
            ),
            Choice::Radio { line, checked } => Payload::new().with(&line.name, *checked),
            // The store-credentials checkbox is a client-side question only.
            Choice::Checkbox { line, .. } if line.role == CheckboxRole::StoreCredentials => {
                Payload::new()
            }
            Choice::Checkbox { line, checked, .. } if *checked => {
                Payload::new().with(&line.name, CHECKED)
            }
            Choice::Checkbox { .. } => Payload::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let satisfied = match self {
            Choice::Select { selected, .. } => selected.is_some(),
            Choice::Radio { .. } => true,
            Choice::Checkbox { checked, .. } => *checked,
        };
        if self.validation().required && !satisfied {
            return Err(self.name().to_string());
        }
        Ok(())
    }
}

impl LoginCredential for Choice {
    fn credential_name(&self) -> &str {
        self.name()
    }

    fn is_login_credential(&self) -> bool {
        matches!(self, Choice::Checkbox { line, .. } if line.login_credential)
    }

    /// Any stored value checks the box.
    fn set_credential(&mut self, _value: &str) {
        if let Choice::Checkbox { checked, .. } = self {
            *checked = true;
        }
    }

    fn credential_value(&self) -> Option<String> {
        self.is_checked().then(|| CHECKED.to_string())
    }
}
