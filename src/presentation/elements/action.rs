use serde::Serialize;
use std::time::Duration;

use crate::config::Configuration;
use crate::definitions::form_line::FormLine;
use crate::definitions::{Action, Payload};

/// What a triggered action sends, before the form is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Submit,
    Back,
    Restart,
    /// Ends the session locally, nothing is sent.
    Abort,
    /// Completion of a redirect, sent as `post-code`.
    Redirect,
    Autosubmit,
    SwitchLoginTabs { tab: String },
    /// A submit triggered from a markup link, carrying the link's parameters.
    LinkAutosubmit { params: Vec<(String, String)> },
}

impl ActionKind {
    /// The `action` value on the wire.
    pub fn wire_action(&self) -> Option<Action> {
        match self {
            ActionKind::Submit | ActionKind::LinkAutosubmit { .. } => Some(Action::Submit),
            ActionKind::Back => Some(Action::Back),
            ActionKind::Restart => Some(Action::Restart),
            ActionKind::Abort => None,
            ActionKind::Redirect => Some(Action::PostCode),
            ActionKind::Autosubmit => Some(Action::Autosubmit),
            ActionKind::SwitchLoginTabs { .. } => Some(Action::SwitchLoginTabs),
        }
    }

    /// Whether local validation gates the request.
    pub fn validates(&self) -> bool {
        matches!(
            self,
            ActionKind::Submit | ActionKind::Autosubmit | ActionKind::Redirect
        )
    }

    /// Back and restart carry nothing but the action.
    pub fn includes_form(&self) -> bool {
        !matches!(
            self,
            ActionKind::Back | ActionKind::Restart | ActionKind::Abort
        )
    }

    pub fn shows_loading(&self) -> bool {
        !matches!(self, ActionKind::Autosubmit)
    }

    /// Parameters merged over the serialized form.
    pub fn extra_payload(&self) -> Payload {
        match self {
            ActionKind::SwitchLoginTabs { tab } => Payload::new().with("params", tab.as_str()),
            ActionKind::LinkAutosubmit { params } => params.iter().cloned().collect(),
            _ => Payload::new(),
        }
    }
}

/// Where a redirect target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectMode {
    /// In a web view owned by the wizard, reporting back over the JS bridge.
    Embedded,
    /// Handed to the system, the host app is re-entered through its deep link.
    Native,
}

/// Result of pressing a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Send(ActionKind),
    OpenRedirect { url: String, mode: RedirectMode },
}

/// Buttons, tabs and the autosubmit timer line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionButton {
    pub line: FormLine,
}

impl ActionButton {
    /// Hands the line back when it is not an action line.
    pub fn new(line: FormLine) -> Result<Self, FormLine> {
        match line {
            FormLine::Submit(_)
            | FormLine::Back(_)
            | FormLine::Restart(_)
            | FormLine::Abort(_)
            | FormLine::Redirect(_)
            | FormLine::Autosubmit(_)
            | FormLine::Tabs(_) => Ok(Self { line }),
            other => Err(other),
        }
    }

    pub fn activate(&self, config: &Configuration) -> Option<Activation> {
        let kind = match &self.line {
            FormLine::Submit(_) => ActionKind::Submit,
            FormLine::Back(_) => ActionKind::Back,
            FormLine::Restart(_) => ActionKind::Restart,
            FormLine::Abort(_) => ActionKind::Abort,
            FormLine::Redirect(redirect) => {
                let mode = if config.allows_native_handoff(&redirect.url) {
                    RedirectMode::Native
                } else {
                    RedirectMode::Embedded
                };
                return Some(Activation::OpenRedirect {
                    url: redirect.url.clone(),
                    mode,
                });
            }
            _ => return None,
        };
        Some(Activation::Send(kind))
    }

    /// Switching to another tab of a tabs line. Re-selecting the current tab
    /// or naming an unknown one does nothing.
    pub fn select_tab(&self, key: &str) -> Option<ActionKind> {
        match &self.line {
            FormLine::Tabs(tabs)
                if tabs.selected != key && tabs.tabs.iter().any(|(k, _)| k == key) =>
            {
                Some(ActionKind::SwitchLoginTabs {
                    tab: key.to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn autosubmit_interval(&self) -> Option<Duration> {
        match &self.line {
            FormLine::Autosubmit(line) => Some(Duration::from_millis(line.interval_ms)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::form_line::{
        AutosubmitLine, ButtonLine, ParagraphLine, RedirectLine, SubmitLine, TabsLine,
    };

    fn config() -> Configuration {
        Configuration::new("key", "https://api.example.com/jsonp")
    }

    #[test]
    fn wire_actions() {
        assert_eq!(ActionKind::Redirect.wire_action(), Some(Action::PostCode));
        assert_eq!(
            ActionKind::LinkAutosubmit { params: vec![] }.wire_action(),
            Some(Action::Submit)
        );
        assert_eq!(ActionKind::Abort.wire_action(), None);
        assert!(!ActionKind::Autosubmit.shows_loading());
        assert!(!ActionKind::Back.includes_form());
        assert!(!ActionKind::LinkAutosubmit { params: vec![] }.validates());
    }

    #[test]
    fn extra_payload() {
        let payload = ActionKind::SwitchLoginTabs { tab: "xs2a".into() }.extra_payload();
        assert_eq!(payload.get("params"), Some(&"xs2a".into()));

        let payload = ActionKind::LinkAutosubmit {
            params: vec![("skip".into(), "1".into())],
        }
        .extra_payload();
        assert_eq!(payload.get("skip"), Some(&"1".into()));
    }

    #[test]
    fn only_action_lines_become_buttons() {
        assert!(ActionButton::new(FormLine::Paragraph(ParagraphLine::default())).is_err());
        let button = ActionButton::new(FormLine::Submit(SubmitLine::default())).unwrap();
        assert_eq!(
            button.activate(&config()),
            Some(Activation::Send(ActionKind::Submit))
        );
        let button = ActionButton::new(FormLine::Back(ButtonLine::default())).unwrap();
        assert_eq!(
            button.activate(&config()),
            Some(Activation::Send(ActionKind::Back))
        );
    }

    #[test]
    fn redirect_mode() {
        let button = ActionButton::new(FormLine::Redirect(RedirectLine {
            label: "Open bank app".into(),
            url: "https://bank.example.com/authorize?id=1".into(),
            back: None,
        }))
        .unwrap();

        let open = |config: &Configuration| match button.activate(config) {
            Some(Activation::OpenRedirect { mode, .. }) => mode,
            other => panic!("unexpected activation {other:?}"),
        };

        assert_eq!(open(&config()), RedirectMode::Embedded);
        let handoff = config().with_native_handoff_prefix("https://bank.example.com/");
        // Without a deep link the user could not come back.
        assert_eq!(open(&handoff), RedirectMode::Embedded);
        let handoff = handoff.with_redirect_deep_link("myapp://xs2a");
        assert_eq!(open(&handoff), RedirectMode::Native);
    }

    #[test]
    fn tabs() {
        let button = ActionButton::new(FormLine::Tabs(TabsLine {
            selected: "xs2a".into(),
            tabs: vec![
                ("xs2a".into(), "Online banking".into()),
                ("api".into(), "Access code".into()),
            ],
        }))
        .unwrap();
        assert_eq!(button.select_tab("xs2a"), None);
        assert_eq!(button.select_tab("other"), None);
        assert_eq!(
            button.select_tab("api"),
            Some(ActionKind::SwitchLoginTabs { tab: "api".into() })
        );
        assert_eq!(button.activate(&config()), None);
    }

    #[test]
    fn autosubmit_interval() {
        let button =
            ActionButton::new(FormLine::Autosubmit(AutosubmitLine { interval_ms: 2500 })).unwrap();
        assert_eq!(
            button.autosubmit_interval(),
            Some(Duration::from_millis(2500))
        );
    }
}
