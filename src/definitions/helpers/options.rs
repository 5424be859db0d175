//! Normalized option tables for `select` and `radio` lines.
//!
//! The backend sends select options either as a JSON array (`["A", "B"]`) or as
//! a JSON object (`{"x": "A", "y": "B"}`). Both are turned into the same ordered
//! `id -> label` table, headed by a disabled placeholder row.
use serde::Serialize;
use serde_json::Value;

/// Id of the synthetic placeholder row that heads every select table.
pub const PLACEHOLDER_ID: &str = "disabled";
/// Localization key of the placeholder row label.
pub const PLACEHOLDER_LABEL: &str = "Choose";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: String,
    pub label: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectOptions(Vec<SelectOption>);

impl SelectOptions {
    /// Builds the table from the wire value. Anything that is neither an array
    /// nor an object yields a table holding only the placeholder row.
    pub fn from_wire(value: &Value) -> Self {
        let mut options = vec![SelectOption {
            id: PLACEHOLDER_ID.to_string(),
            label: PLACEHOLDER_LABEL.to_string(),
            disabled: true,
        }];

        match value {
            Value::Array(items) => {
                options.extend(items.iter().enumerate().map(|(index, item)| SelectOption {
                    id: index.to_string(),
                    label: string_value(item),
                    disabled: false,
                }))
            }
            Value::Object(items) => options.extend(items.iter().map(|(id, item)| SelectOption {
                id: id.clone(),
                label: string_value(item),
                disabled: false,
            })),
            _ => {}
        }

        Self(options)
    }

    pub fn get(&self, id: &str) -> Option<&SelectOption> {
        self.0.iter().find(|option| option.id == id)
    }

    /// Whether `id` names a row the user may pick.
    pub fn is_selectable(&self, id: &str) -> bool {
        self.get(id).map(|option| !option.disabled).unwrap_or(false)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|option| option.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Deref for SelectOptions {
    type Target = [SelectOption];

    fn deref(&self) -> &[SelectOption] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadioOption {
    pub label: String,
    pub disabled: bool,
}

/// Radio options arrive as plain strings or as `{label, disabled}` objects.
/// Empty strings and empty objects are dropped, order is kept.
pub fn radio_options(value: &Value) -> Vec<RadioOption> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) if !map.is_empty() => Some(RadioOption {
                label: map.get("label").map(string_value).unwrap_or_default(),
                disabled: map.get("disabled").map(bool_value).unwrap_or(false),
            }),
            Value::Object(_) => None,
            other => {
                let label = string_value(other);
                (!label.is_empty()).then_some(RadioOption {
                    label,
                    disabled: false,
                })
            }
        })
        .collect()
}

/// Lenient string coercion: numbers and booleans are printed, null and
/// containers become the empty string.
pub fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Lenient boolean coercion, accepting `1`, `"true"` and `"1"` as true.
pub fn bool_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}
