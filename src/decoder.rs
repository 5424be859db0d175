//! Maps backend responses onto [Classification]s and [FormLineDescriptor]s.
//!
//! Decoding never fails on content. Unknown line types are skipped, unknown
//! error codes become [SessionErrorKind::Other], missing fields take their
//! empty value. Only bytes that are not a JSON object are rejected.
use serde_json::{Map, Value};

use crate::config::Configuration;
use crate::definitions::form_line::{
    AutosubmitLine, ButtonLine, CaptchaLine, CheckboxLine, CheckboxRole, DescriptionLine, FlickerLine,
    FormLine, FormLineDescriptor, GroupTag, HiddenLine, ImageLine, ImageSource, MultiLine,
    ParagraphLine, PasswordLine, RadioLine, RedirectLine, SelectLine, Severity, SubForm,
    SubmitLine, TabsLine, TextLine, Validation, PRIVACY_POLICY,
};
use crate::definitions::helpers::options::{bool_value, radio_options, string_value};
use crate::definitions::helpers::{NonEmptyVec, SelectOptions};
use crate::definitions::response::{
    Classification, Response, SessionError, SessionErrorKind, WizardStep,
};

const FINISH: &str = "finish";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("response is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json object at the top level of the response")]
    NotAnObject,
}

/// Decoding options taken from the session [Configuration].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    /// Emit a back button for submit and redirect lines with a `back` label.
    pub enable_back_button: bool,
    /// Offer to store login credentials found on a page.
    pub offer_credential_storage: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            enable_back_button: true,
            offer_credential_storage: true,
        }
    }
}

impl From<&Configuration> for Decoder {
    fn from(config: &Configuration) -> Self {
        Self {
            enable_back_button: config.enable_back_button,
            offer_credential_storage: config.offer_credential_storage,
        }
    }
}

impl Decoder {
    pub fn classify_slice(&self, bytes: &[u8]) -> Result<Response, Error> {
        let json: Value = serde_json::from_slice(bytes)?;
        self.classify(&json)
    }

    /// Classifies a response. A finish callback wins over everything else, an
    /// error is reported together with the lines that came with it.
    pub fn classify(&self, json: &Value) -> Result<Response, Error> {
        let root = json.as_object().ok_or(Error::NotAnObject)?;

        let step = root
            .get("callback")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<WizardStep>().ok());
        let normalized_step = root
            .get("step")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<WizardStep>().ok());
        let language = root
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string);
        let first_param = root
            .get("callbackParams")
            .and_then(Value::as_array)
            .and_then(|params| params.first());

        let mut response = Response {
            classification: Classification::Finished,
            step,
            normalized_step,
            language,
            provider: None,
            back_button_present: false,
        };

        if root.get("callback").and_then(Value::as_str) == Some(FINISH) {
            if let Some(param) = first_param {
                response.classification = Classification::FinishedWithCredential {
                    credential: credential_string(param),
                };
            }
            return Ok(response);
        }

        response.provider = first_param
            .and_then(Value::as_object)
            .and_then(|params| params.get("provider"))
            .map(credential_string);

        let (lines, _) = self.decode(root.get("form").unwrap_or(&Value::Null), 0, None);
        let lines = self.with_store_credentials(lines);
        response.back_button_present = lines
            .iter()
            .rev()
            .find(|d| matches!(d.line, FormLine::Submit(_) | FormLine::Redirect(_)))
            .and_then(|d| d.line.back_label())
            .is_some();

        response.classification = match root.get("error").and_then(Value::as_str) {
            Some(code) => {
                let error = SessionError {
                    kind: SessionErrorKind::from_code(code),
                    recoverable: root
                        .get("isErrorRecoverable")
                        .map(bool_value)
                        .unwrap_or(false),
                };
                tracing::debug!("response carries session error: {error}");
                Classification::SessionError { error, lines }
            }
            None => Classification::FormLines { lines },
        };

        Ok(response)
    }

    /// Decodes a `form` array into descriptors whose indices start at `start`.
    /// Returns the descriptors and the next free index.
    ///
    /// Lines nested in a multi-form follow their container in the result and
    /// continue its index run. Each is tagged with the group of its sub-form.
    /// The first child takes the index after the container rather than the
    /// container's own, so indices stay unique across the page.
    pub fn decode(
        &self,
        form: &Value,
        start: usize,
        group: Option<&GroupTag>,
    ) -> (Vec<FormLineDescriptor>, usize) {
        let mut lines = Vec::new();
        let mut next = start;

        let Some(elements) = form.as_array() else {
            return (lines, next);
        };

        for element in elements {
            let Some(node) = element.as_object() else {
                tracing::warn!("skipping form line that is not an object");
                continue;
            };
            let kind = text(node, "type");

            let mut push = |line: FormLine, lines: &mut Vec<FormLineDescriptor>| {
                lines.push(FormLineDescriptor {
                    index: next,
                    group: group.cloned(),
                    line,
                });
                next += 1;
            };

            match kind.as_str() {
                "text" => push(FormLine::Text(text_line(node)), &mut lines),
                "password" => push(
                    FormLine::Password(PasswordLine {
                        name: text(node, "name"),
                        label: text(node, "label"),
                        placeholder: text(node, "placeholder"),
                        disabled: flag(node, "disabled"),
                        login_credential: flag(node, "login_credential"),
                        validation: validation(node),
                    }),
                    &mut lines,
                ),
                "captcha" => push(
                    FormLine::Captcha(CaptchaLine {
                        name: text(node, "name"),
                        label: text(node, "label"),
                        placeholder: text(node, "placeholder"),
                        image: ImageSource(text(node, "data")),
                        validation: validation(node),
                    }),
                    &mut lines,
                ),
                "flicker" => push(
                    FormLine::Flicker(FlickerLine {
                        name: text(node, "name"),
                        label: text(node, "label"),
                        code: flicker_code(node.get("code")),
                        validation: validation(node),
                    }),
                    &mut lines,
                ),
                "select" => push(
                    FormLine::Select(SelectLine {
                        name: text(node, "name"),
                        label: text(node, "label"),
                        selected: text(node, "selected"),
                        options: SelectOptions::from_wire(node.get("options").unwrap_or(&Value::Null)),
                        validation: validation(node),
                    }),
                    &mut lines,
                ),
                "radio" => push(
                    FormLine::Radio(RadioLine {
                        name: text(node, "name"),
                        label: text(node, "label"),
                        checked: number(node, "checked").max(0) as usize,
                        options: radio_options(node.get("options").unwrap_or(&Value::Null)),
                        validation: validation(node),
                    }),
                    &mut lines,
                ),
                "checkbox" => {
                    let name = text(node, "name");
                    push(
                        FormLine::Checkbox(CheckboxLine {
                            login_credential: name == PRIVACY_POLICY,
                            name,
                            label: text(node, "label"),
                            checked: flag(node, "checked"),
                            disabled: flag(node, "disabled"),
                            validation: validation(node),
                            ..Default::default()
                        }),
                        &mut lines,
                    )
                }
                "paragraph" => push(
                    FormLine::Paragraph(ParagraphLine {
                        title: text(node, "title"),
                        text: text(node, "text"),
                        severity: text(node, "severity").parse().unwrap_or(Severity::None),
                    }),
                    &mut lines,
                ),
                "description" => push(
                    FormLine::Description(DescriptionLine {
                        text: text(node, "text"),
                    }),
                    &mut lines,
                ),
                "submit" | "redirect" => {
                    let back = node.get("back").and_then(Value::as_str).map(str::to_string);
                    let line = if kind == "submit" {
                        FormLine::Submit(SubmitLine {
                            label: text(node, "label"),
                            back: back.clone(),
                        })
                    } else {
                        FormLine::Redirect(RedirectLine {
                            label: text(node, "label"),
                            url: text(node, "url"),
                            back: back.clone(),
                        })
                    };
                    push(line, &mut lines);
                    if let Some(label) = back.filter(|_| self.enable_back_button) {
                        push(FormLine::Back(ButtonLine { label }), &mut lines);
                    }
                }
                "restart" => push(
                    FormLine::Restart(ButtonLine {
                        label: text(node, "label"),
                    }),
                    &mut lines,
                ),
                "abort" => push(
                    FormLine::Abort(ButtonLine {
                        label: text(node, "label"),
                    }),
                    &mut lines,
                ),
                "autosubmit" => push(
                    FormLine::Autosubmit(AutosubmitLine {
                        interval_ms: number(node, "interval").max(0) as u64,
                    }),
                    &mut lines,
                ),
                "hidden" => push(
                    FormLine::Hidden(HiddenLine {
                        name: text(node, "name"),
                        value: text(node, "value"),
                    }),
                    &mut lines,
                ),
                "image" => push(
                    FormLine::Image(ImageLine {
                        image: ImageSource(text(node, "data")),
                    }),
                    &mut lines,
                ),
                "tabs" => push(
                    FormLine::Tabs(TabsLine {
                        selected: text(node, "selected"),
                        tabs: node
                            .get("tabs")
                            .and_then(Value::as_object)
                            .map(|tabs| {
                                tabs.iter()
                                    .map(|(key, label)| (key.clone(), string_value(label)))
                                    .collect()
                            })
                            .unwrap_or_default(),
                    }),
                    &mut lines,
                ),
                "logo" => push(FormLine::Logo, &mut lines),
                "multi" => {
                    let Some((multi, sub_forms)) = multi_line(node) else {
                        tracing::warn!("skipping multi form without sub-forms");
                        continue;
                    };
                    let name = multi.name.clone();
                    push(FormLine::Multi(multi), &mut lines);

                    for (value, form) in sub_forms {
                        let tag = GroupTag::new(name.clone(), value);
                        let (nested, after) = self.decode(form, next, Some(&tag));
                        lines.extend(nested);
                        next = after;
                    }
                }
                other => tracing::warn!("skipping unknown form line type `{other}`"),
            }
        }

        (lines, next)
    }

    /// Inserts the store-credentials checkbox before the first submit line,
    /// or at the end, when the page asks for login credentials outside any
    /// multi-form. Indices are renumbered afterwards.
    pub fn with_store_credentials(
        &self,
        mut lines: Vec<FormLineDescriptor>,
    ) -> Vec<FormLineDescriptor> {
        let asks_for_credentials = lines.iter().any(FormLineDescriptor::is_top_level_credential);
        let already_offered = lines.iter().any(|d| {
            matches!(&d.line, FormLine::Checkbox(c) if c.role == CheckboxRole::StoreCredentials)
        });
        if !self.offer_credential_storage || !asks_for_credentials || already_offered {
            return lines;
        }

        let at = lines
            .iter()
            .position(|d| matches!(d.line, FormLine::Submit(_)))
            .unwrap_or(lines.len());
        let start = lines.first().map(|d| d.index).unwrap_or(0);
        lines.insert(
            at,
            FormLineDescriptor {
                index: 0,
                group: None,
                line: FormLine::Checkbox(CheckboxLine::store_credentials()),
            },
        );
        for (offset, descriptor) in lines.iter_mut().enumerate() {
            descriptor.index = start + offset;
        }
        lines
    }
}

fn text_line(node: &Map<String, Value>) -> TextLine {
    TextLine {
        name: text(node, "name"),
        label: text(node, "label"),
        value: text(node, "value"),
        placeholder: text(node, "placeholder"),
        disabled: flag(node, "disabled"),
        autocomplete_action: Some(text(node, "autocomplete_action")).filter(|a| !a.is_empty()),
        login_credential: flag(node, "login_credential"),
        validation: validation(node),
    }
}

/// Splits a multi node into its container line and the `(value, form)` pairs
/// of its sub-forms. `None` when there is no sub-form at all.
fn multi_line(node: &Map<String, Value>) -> Option<(MultiLine, Vec<(String, &Value)>)> {
    let entries = node.get("forms").and_then(Value::as_array)?;
    let mut forms = Vec::with_capacity(entries.len());
    let mut nested = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter_map(Value::as_object) {
        let value = text(entry, "value");
        forms.push(SubForm {
            label: text(entry, "label"),
            value: value.clone(),
        });
        let form = entry
            .get("form")
            .or_else(|| entry.get("forms"))
            .unwrap_or(&Value::Null);
        nested.push((value, form));
    }
    let forms = NonEmptyVec::maybe_new(forms)?;

    let requested = text(node, "selected");
    let selected = forms.find_or_head(|f| f.value == requested).value.clone();
    Some((
        MultiLine {
            name: text(node, "name"),
            selected,
            forms,
        },
        nested,
    ))
}

fn flicker_code(code: Option<&Value>) -> Vec<Vec<i64>> {
    code.and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(|c| c.as_i64().unwrap_or(0)).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn validation(node: &Map<String, Value>) -> Validation {
    Validation {
        invalid: flag(node, "invalid"),
        required: flag(node, "required"),
        message: node
            .get("validation_error")
            .or_else(|| node.get("error_message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
    }
}

fn credential_string(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => string_value(other),
    }
}

fn text(node: &Map<String, Value>, key: &str) -> String {
    node.get(key).map(string_value).unwrap_or_default()
}

fn flag(node: &Map<String, Value>, key: &str) -> bool {
    node.get(key).map(bool_value).unwrap_or(false)
}

fn number(node: &Map<String, Value>, key: &str) -> i64 {
    match node.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
