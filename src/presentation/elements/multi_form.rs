use serde::Serialize;

use super::ExposableFields;
use crate::definitions::form_line::{MultiLine, SubForm};
use crate::definitions::Payload;

/// Owns the selection of one multi-form. Lines of the page are shown when
/// their group names this form and carries the selected value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiForm {
    pub line: MultiLine,
    selected: String,
}

impl MultiForm {
    pub fn new(line: MultiLine) -> Self {
        let selected = line.selected.clone();
        Self { line, selected }
    }

    pub fn name(&self) -> &str {
        &self.line.name
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn options(&self) -> &[SubForm] {
        &self.line.forms
    }

    /// Returns `false` for a value none of the sub-forms carries.
    pub fn select(&mut self, value: &str) -> bool {
        if !self.line.forms.iter().any(|form| form.value == value) {
            tracing::warn!("multi form `{}` has no sub-form `{value}`", self.line.name);
            return false;
        }
        self.selected = value.to_string();
        true
    }
}

impl ExposableFields for MultiForm {
    fn exposed_fields(&self) -> Payload {
        Payload::new().with(&self.line.name, self.selected.as_str())
    }
}
