//! Sans-IO state machine of one wizard session.
//!
//! The [Orchestrator] never performs IO. Every [Event] fed to
//! [Orchestrator::handle] yields the [Effect]s the driver has to carry out:
//! requests to send, timers to arm, notifications for the host, storage calls.
//! Results of those effects come back as further events. Requests and storage
//! calls are tagged with a generation so that answers arriving after the
//! session moved on are dropped.
//!
//! ```text
//! Idle -> AwaitingInitialResponse -> Displaying <-> Submitting
//!                                        |
//!                                        +-> Finished | Aborted | FatalError
//! ```
use serde::Serialize;
use std::time::Duration;

use super::autocomplete::{self, SearchInput, Suggestion, DEFAULT_COUNTRY_ID};
use super::elements::{
    ActionKind, Activation, Element, ElementKind, Page, RedirectMode, ValidationError,
};
use super::storage::{self, credential_key, Availability};
use crate::config::Configuration;
use crate::decoder::Decoder;
use crate::definitions::helpers::Segment;
use crate::definitions::request::ACTION_KEY;
use crate::definitions::{Classification, FormLineDescriptor, Payload, Response, SessionError, WizardStep};
use crate::transport;

/// Message the embedded web view posts when the bank flow succeeded.
pub const WEB_VIEW_DONE: &str = "done";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    AwaitingInitialResponse,
    Displaying,
    Submitting,
    Finished,
    Aborted,
    FatalError,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Finished | State::Aborted | State::FatalError)
    }
}

/// How the session ended. Delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "credential", rename_all = "snake_case")]
pub enum Completion {
    Finished,
    FinishedWithCredential(String),
    UserAborted,
    NetworkError,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Completion::Finished | Completion::FinishedWithCredential(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Background,
    Foreground,
}

/// Interactions with the elements of the current page, addressed by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SetText { index: usize, value: String },
    /// Picks an option of a select line by id.
    Pick { index: usize, id: String },
    /// Checks an option of a radio line by position.
    CheckOption { index: usize, position: usize },
    Toggle { index: usize },
    SelectSubForm { index: usize, value: String },
    SelectTab { index: usize, key: String },
    Press { index: usize },
    /// Return key in a text field.
    Return { index: usize },
    /// A link, dialog or autosubmit segment of a label was tapped.
    ActivateSegment(Segment),
    /// Text typed into the bank search of the field at `index`.
    Search { index: usize, query: String },
    /// A bank suggestion or a complete IBAN was confirmed.
    PickSuggestion { index: usize, value: String },
}

#[derive(Debug)]
pub enum Event {
    User(UserAction),
    Response {
        generation: u64,
        result: Result<Vec<u8>, transport::Error>,
    },
    SearchResponse {
        generation: u64,
        result: Result<Vec<u8>, transport::Error>,
    },
    TimerFired {
        page: u64,
    },
    Connectivity {
        online: bool,
    },
    Lifecycle(Lifecycle),
    CredentialsProbed {
        page: u64,
        availability: Availability,
    },
    AutofillAnswered {
        page: u64,
        accepted: bool,
    },
    CredentialsFetched {
        page: u64,
        result: Result<Vec<(String, String)>, storage::Error>,
    },
    /// The redirect opened for the user has returned, with the web view
    /// message or the deep link payload.
    RedirectCompleted {
        message: String,
    },
    /// The user tries to dismiss the wizard, which needs a confirmation.
    DismissRequested,
    AbortConfirmed {
        confirmed: bool,
    },
}

/// Notifications for the host application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    StepChanged { step: WizardStep },
    BackButtonAvailable { available: bool },
    /// Informational, the session goes on.
    SessionError { error: SessionError },
    ValidationFailed { errors: Vec<ValidationError> },
    ConfirmAbort,
    /// Stored credentials exist for this page; answer with
    /// [Event::AutofillAnswered].
    OfferAutofill { page: u64 },
    OpenRedirect { url: String, mode: RedirectMode },
    OpenLink { url: String },
    ShowNotice { url: String },
    Offline { offline: bool },
    Suggestions {
        index: usize,
        input: SearchInput,
        suggestions: Vec<Suggestion>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send { generation: u64, payload: Payload },
    Search { generation: u64, payload: Payload },
    /// Cancel the request in flight. Its result must not be reported, a
    /// result that still arrives is dropped as stale.
    Cancel,
    StartTimer { page: u64, after: Duration },
    ClearTimer,
    Loading(bool),
    /// The page changed, `animated` tells whether the old one may be torn
    /// down with an animation.
    Render { animated: bool },
    /// Focus the element at the index, or dismiss the keyboard.
    Focus(Option<usize>),
    Host(HostEvent),
    ProbeCredentials { page: u64, keys: Vec<String> },
    FetchCredentials { page: u64, keys: Vec<String> },
    StoreCredentials { entries: Vec<(String, String)> },
    Complete(Completion),
}

pub struct Orchestrator {
    config: Configuration,
    decoder: Decoder,
    state: State,
    page: Page,
    page_generation: u64,
    request_generation: u64,
    in_flight: Option<u64>,
    search_generation: u64,
    search_index: Option<usize>,
    offline: bool,
    /// A request was cancelled by going offline or to the background.
    interrupted: bool,
    backgrounded: bool,
    language_negotiated: bool,
    provider: Option<String>,
    step: Option<WizardStep>,
    autofill_offered: bool,
    pending_credentials: Vec<(String, String)>,
}

impl Orchestrator {
    pub fn new(config: Configuration) -> Self {
        Self {
            decoder: Decoder::from(&config),
            config,
            state: State::Idle,
            page: Page::default(),
            page_generation: 0,
            request_generation: 0,
            in_flight: None,
            search_generation: 0,
            search_index: None,
            offline: false,
            interrupted: false,
            backgrounded: false,
            language_negotiated: false,
            provider: None,
            step: None,
            autofill_offered: false,
            pending_credentials: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_generation(&self) -> u64 {
        self.page_generation
    }

    pub fn step(&self) -> Option<&WizardStep> {
        self.step.as_ref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// A request is outstanding, new actions are dropped.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Sends the first request of the session.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != State::Idle {
            tracing::warn!("session already started");
            return Vec::new();
        }
        self.state = State::AwaitingInitialResponse;
        let mut effects = vec![Effect::Loading(true)];
        effects.extend(self.request(self.initial_payload()));
        effects
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.state.is_terminal() {
            tracing::debug!("session has ended, ignoring {event:?}");
            return Vec::new();
        }
        match event {
            Event::User(action) => self.on_user_action(action),
            Event::Response { generation, result } => self.on_response(generation, result),
            Event::SearchResponse { generation, result } => {
                self.on_search_response(generation, result)
            }
            Event::TimerFired { page } if page == self.page_generation => {
                tracing::debug!("autosubmit timer fired");
                self.send_action(ActionKind::Autosubmit)
            }
            Event::TimerFired { .. } => Vec::new(),
            Event::Connectivity { online } => self.on_connectivity(online),
            Event::Lifecycle(lifecycle) => self.on_lifecycle(lifecycle),
            Event::CredentialsProbed { page, availability } => {
                if page != self.page_generation || !availability.is_present() {
                    return Vec::new();
                }
                vec![Effect::Host(HostEvent::OfferAutofill { page })]
            }
            Event::AutofillAnswered { page, accepted } => {
                if page != self.page_generation || !accepted {
                    return Vec::new();
                }
                let keys = self.credential_keys();
                vec![Effect::FetchCredentials { page, keys }]
            }
            Event::CredentialsFetched { page, result } => match result {
                _ if page != self.page_generation => Vec::new(),
                Ok(values) => self.autofill(values),
                Err(e) => {
                    tracing::warn!("stored credentials could not be read: {e}");
                    Vec::new()
                }
            },
            Event::RedirectCompleted { message } => {
                if message == WEB_VIEW_DONE {
                    tracing::debug!("redirect completed");
                } else {
                    tracing::debug!("redirect left without completion");
                }
                self.send_action(ActionKind::Redirect)
            }
            Event::DismissRequested => vec![Effect::Host(HostEvent::ConfirmAbort)],
            Event::AbortConfirmed { confirmed: true } => self.abort(),
            Event::AbortConfirmed { confirmed: false } => Vec::new(),
        }
    }

    fn initial_payload(&self) -> Payload {
        Payload::initial(
            &self.config.client_version,
            self.config.language,
            self.config.redirect_deep_link.as_deref(),
        )
    }

    fn request(&mut self, payload: Payload) -> Vec<Effect> {
        self.request_generation += 1;
        self.in_flight = Some(self.request_generation);
        vec![Effect::Send {
            generation: self.request_generation,
            payload,
        }]
    }

    /// Builds and sends the request of `kind`. Dropped while another request
    /// is outstanding or the device is offline.
    fn send_action(&mut self, kind: ActionKind) -> Vec<Effect> {
        if kind == ActionKind::Abort {
            return self.abort();
        }
        if self.in_flight.is_some() {
            tracing::debug!("request outstanding, dropping {kind:?}");
            return Vec::new();
        }
        if self.offline {
            tracing::debug!("offline, dropping {kind:?}");
            return Vec::new();
        }
        if self.state != State::Displaying {
            tracing::debug!("no page on screen, dropping {kind:?}");
            return Vec::new();
        }

        if kind.validates() {
            if let Err(errors) = self.page.validate() {
                tracing::debug!("{} field(s) failed validation", errors.len());
                return vec![Effect::Host(HostEvent::ValidationFailed { errors })];
            }
        }

        let mut payload = if kind.includes_form() {
            self.page.serialize_form()
        } else {
            Payload::new()
        };
        payload.merge(kind.extra_payload());
        if let Some(action) = kind.wire_action() {
            payload.insert(ACTION_KEY, action.as_ref());
        }
        if kind.includes_form() {
            self.capture_credentials();
        }

        self.state = State::Submitting;
        let mut effects = Vec::new();
        if kind.shows_loading() {
            effects.push(Effect::Loading(true));
        }
        effects.extend(self.request(payload));
        effects
    }

    fn abort(&mut self) -> Vec<Effect> {
        tracing::debug!("session aborted by the user");
        let mut effects = Vec::new();
        if self.in_flight.take().is_some() {
            effects.push(Effect::Cancel);
        }
        self.state = State::Aborted;
        effects.extend([
            Effect::ClearTimer,
            Effect::Loading(false),
            Effect::Complete(Completion::UserAborted),
        ]);
        effects
    }

    fn fail(&mut self) -> Vec<Effect> {
        self.state = State::FatalError;
        vec![
            Effect::ClearTimer,
            Effect::Loading(false),
            Effect::Complete(Completion::NetworkError),
        ]
    }

    /// Back to the page after a request ended without a new one.
    fn settle(&mut self) {
        if self.state == State::Submitting {
            self.state = State::Displaying;
        }
    }

    fn on_response(
        &mut self,
        generation: u64,
        result: Result<Vec<u8>, transport::Error>,
    ) -> Vec<Effect> {
        if self.in_flight != Some(generation) {
            tracing::debug!("dropping stale response {generation}");
            return Vec::new();
        }
        self.in_flight = None;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("request failed: {e}");
                return self.fail();
            }
        };
        let response = match self.decoder.classify_slice(&bytes) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("response could not be decoded: {e}");
                return self.fail();
            }
        };

        if let Some(effects) = self.negotiate_language(&response) {
            return effects;
        }

        let mut effects = vec![Effect::Loading(false)];
        if let Some(provider) = &response.provider {
            self.provider = Some(provider.clone());
        }
        if let Some(step) = response.normalized_step.or(response.step) {
            if self.step.as_ref() != Some(&step) {
                self.step = Some(step.clone());
                effects.push(Effect::Host(HostEvent::StepChanged { step }));
            }
        }

        match response.classification {
            Classification::Finished => effects.extend(self.finish(Completion::Finished)),
            Classification::FinishedWithCredential { credential } => {
                effects.extend(self.finish(Completion::FinishedWithCredential(credential)))
            }
            Classification::SessionError { error, lines } => {
                tracing::debug!("session error: {error}");
                effects.push(Effect::Host(HostEvent::SessionError { error }));
                effects.extend(self.show(lines, response.back_button_present));
            }
            Classification::FormLines { lines } => {
                effects.extend(self.show(lines, response.back_button_present))
            }
        }
        effects
    }

    /// Asks once per session for the configured language when the backend
    /// answered in another one.
    fn negotiate_language(&mut self, response: &Response) -> Option<Vec<Effect>> {
        if self.language_negotiated || response.classification.is_final() {
            return None;
        }
        self.language_negotiated = true;
        let language = response.language.as_deref()?;
        if language == self.config.language.as_ref() {
            return None;
        }
        tracing::debug!(
            "backend answered in `{language}`, switching to `{}`",
            self.config.language
        );
        let payload = Payload::change_language(self.config.language);
        Some(self.request(payload))
    }

    fn finish(&mut self, completion: Completion) -> Vec<Effect> {
        self.state = State::Finished;
        let mut effects = vec![Effect::ClearTimer];
        if !self.pending_credentials.is_empty() {
            effects.push(Effect::StoreCredentials {
                entries: std::mem::take(&mut self.pending_credentials),
            });
        }
        effects.push(Effect::Complete(completion));
        effects
    }

    fn show(&mut self, lines: Vec<FormLineDescriptor>, back_button_present: bool) -> Vec<Effect> {
        // Pages with an autosubmit line are replaced without animation.
        let animated = !self.page.iter().any(Element::is_autosubmit);
        self.page = Page::new(lines);
        self.page_generation += 1;
        self.state = State::Displaying;

        let mut effects = vec![
            Effect::ClearTimer,
            Effect::Host(HostEvent::BackButtonAvailable {
                available: back_button_present,
            }),
            Effect::Render { animated },
        ];
        if let Some(after) = self.page.autosubmit_interval() {
            effects.push(Effect::StartTimer {
                page: self.page_generation,
                after,
            });
        }
        effects.extend(self.probe_credentials());
        effects
    }

    fn credential_keys(&self) -> Vec<String> {
        let Some(provider) = self.provider.as_deref() else {
            return Vec::new();
        };
        self.page
            .top_level_credentials()
            .map(|credential| credential.credential_name())
            .filter(|name| !name.is_empty())
            .map(|name| credential_key(provider, name))
            .collect()
    }

    /// Stored credentials are offered at most once per session.
    fn probe_credentials(&mut self) -> Vec<Effect> {
        if self.autofill_offered {
            return Vec::new();
        }
        let keys = self.credential_keys();
        if keys.is_empty() {
            return Vec::new();
        }
        self.autofill_offered = true;
        vec![Effect::ProbeCredentials {
            page: self.page_generation,
            keys,
        }]
    }

    /// Fills the page from stored credentials and submits it.
    fn autofill(&mut self, values: Vec<(String, String)>) -> Vec<Effect> {
        let Some(provider) = self.provider.clone() else {
            return Vec::new();
        };
        let mut filled = 0;
        for element in self.page.iter_mut().filter(|element| element.group.is_none()) {
            let Some(credential) = element
                .login_credential_mut()
                .filter(|credential| credential.is_login_credential())
            else {
                continue;
            };
            let key = credential_key(&provider, credential.credential_name());
            if let Some((_, value)) = values.iter().find(|(stored, _)| *stored == key) {
                credential.set_credential(value);
                filled += 1;
            }
        }
        if filled == 0 {
            return Vec::new();
        }
        tracing::debug!("filled {filled} field(s) from secure storage");

        let mut effects = vec![Effect::Render { animated: false }];
        effects.extend(self.send_action(ActionKind::Submit));
        effects
    }

    /// Remembers the credentials of this submission when the user allowed
    /// storing them. They are written once the session finishes.
    fn capture_credentials(&mut self) {
        if !self.page.store_credentials_checked() {
            return;
        }
        let Some(provider) = self.provider.as_deref() else {
            tracing::debug!("no provider known, credentials are not stored");
            return;
        };
        let captured: Vec<(String, String)> = self
            .page
            .top_level_credentials()
            .filter_map(|credential| {
                let value = credential.credential_value()?;
                Some((credential_key(provider, credential.credential_name()), value))
            })
            .collect();
        self.pending_credentials
            .retain(|(key, _)| !captured.iter().any(|(new, _)| new == key));
        self.pending_credentials.extend(captured);
    }

    fn on_connectivity(&mut self, online: bool) -> Vec<Effect> {
        if online != self.offline {
            return Vec::new();
        }
        self.offline = !online;
        let mut effects = vec![Effect::Host(HostEvent::Offline {
            offline: self.offline,
        })];
        if self.offline {
            effects.extend(self.interrupt());
        } else {
            effects.extend(self.resync());
        }
        effects
    }

    fn on_lifecycle(&mut self, lifecycle: Lifecycle) -> Vec<Effect> {
        match lifecycle {
            Lifecycle::Background => {
                self.backgrounded = true;
                let mut effects = vec![Effect::ClearTimer];
                effects.extend(self.interrupt());
                effects
            }
            // Repeated foreground notifications leave an armed timer alone.
            Lifecycle::Foreground if !std::mem::take(&mut self.backgrounded) => Vec::new(),
            Lifecycle::Foreground if self.page.autosubmit_interval().is_some() => {
                self.interrupted = false;
                self.send_action(ActionKind::Autosubmit)
            }
            Lifecycle::Foreground if self.interrupted && !self.offline => self.resync(),
            Lifecycle::Foreground => Vec::new(),
        }
    }

    /// Cancels the request in flight, to be repeated by [Self::resync].
    fn interrupt(&mut self) -> Vec<Effect> {
        if self.in_flight.take().is_none() {
            return Vec::new();
        }
        tracing::debug!("cancelling request in flight");
        self.interrupted = true;
        self.settle();
        vec![Effect::Cancel, Effect::Loading(false)]
    }

    /// Fetches the current page without repeating the last action.
    fn resync(&mut self) -> Vec<Effect> {
        self.interrupted = false;
        if self.in_flight.is_some() {
            return Vec::new();
        }
        let payload = match self.state {
            State::AwaitingInitialResponse => self.initial_payload(),
            State::Displaying | State::Submitting => {
                self.state = State::Submitting;
                Payload::resync()
            }
            _ => return Vec::new(),
        };
        tracing::debug!("resyncing session state");
        let mut effects = vec![Effect::Loading(true)];
        effects.extend(self.request(payload));
        effects
    }

    fn on_user_action(&mut self, action: UserAction) -> Vec<Effect> {
        if !matches!(self.state, State::Displaying | State::Submitting) {
            tracing::debug!("no page on screen, ignoring {action:?}");
            return Vec::new();
        }

        let (index, changed) = match action {
            UserAction::SetText { index, value } => {
                return match self.page.get_mut(index).and_then(Element::as_input_mut) {
                    Some(input) => {
                        input.set_value(value);
                        Vec::new()
                    }
                    None => unknown_element(index),
                };
            }
            UserAction::Pick { index, id } => (
                index,
                self.page
                    .get_mut(index)
                    .and_then(Element::as_choice_mut)
                    .map(|choice| choice.pick(&id)),
            ),
            UserAction::CheckOption { index, position } => (
                index,
                self.page
                    .get_mut(index)
                    .and_then(Element::as_choice_mut)
                    .map(|choice| choice.check_option(position)),
            ),
            UserAction::Toggle { index } => (
                index,
                self.page
                    .get_mut(index)
                    .and_then(Element::as_choice_mut)
                    .map(|choice| choice.toggle().is_some()),
            ),
            UserAction::SelectSubForm { index, value } => {
                (index, Some(self.page.select_sub_form(index, &value)))
            }
            UserAction::PickSuggestion { index, value } => (
                index,
                self.page
                    .get_mut(index)
                    .and_then(Element::as_input_mut)
                    .map(|input| {
                        input.set_value(value);
                        true
                    }),
            ),
            UserAction::SelectTab { index, key } => {
                return match self
                    .page
                    .get(index)
                    .and_then(Element::as_action)
                    .and_then(|button| button.select_tab(&key))
                {
                    Some(kind) => self.send_action(kind),
                    None => Vec::new(),
                };
            }
            UserAction::Press { index } => {
                let activation = self
                    .page
                    .get(index)
                    .and_then(Element::as_action)
                    .and_then(|button| button.activate(&self.config));
                return match activation {
                    Some(Activation::Send(kind)) => self.send_action(kind),
                    Some(Activation::OpenRedirect { url, mode }) => {
                        vec![Effect::Host(HostEvent::OpenRedirect { url, mode })]
                    }
                    None => unknown_element(index),
                };
            }
            UserAction::Return { index } => return vec![Effect::Focus(self.page.next_focus(index))],
            UserAction::ActivateSegment(segment) => return self.on_segment(segment),
            UserAction::Search { index, query } => return self.search(index, &query),
        };

        match changed {
            Some(true) => vec![Effect::Render { animated: false }],
            Some(false) => Vec::new(),
            None => unknown_element(index),
        }
    }

    fn on_segment(&mut self, segment: Segment) -> Vec<Effect> {
        match segment {
            Segment::Link { url, .. } => vec![Effect::Host(HostEvent::OpenLink { url })],
            Segment::Dialog { url, .. } => vec![Effect::Host(HostEvent::ShowNotice { url })],
            Segment::Autosubmit { params, .. } => {
                self.send_action(ActionKind::LinkAutosubmit { params })
            }
            _ => Vec::new(),
        }
    }

    fn search(&mut self, index: usize, query: &str) -> Vec<Effect> {
        let searchable_field = self
            .page
            .get(index)
            .and_then(|element| match &element.kind {
                ElementKind::Input(input) => input.autocomplete_action(),
                _ => None,
            })
            .is_some();
        if !searchable_field {
            return unknown_element(index);
        }

        let input = SearchInput::classify(query);
        if !input.is_searchable() {
            return vec![Effect::Host(HostEvent::Suggestions {
                index,
                input,
                suggestions: Vec::new(),
            })];
        }

        let country_id = self.page.country_id().unwrap_or(DEFAULT_COUNTRY_ID);
        let payload = autocomplete::request(query, country_id);
        self.search_generation += 1;
        self.search_index = Some(index);
        vec![Effect::Search {
            generation: self.search_generation,
            payload,
        }]
    }

    fn on_search_response(
        &mut self,
        generation: u64,
        result: Result<Vec<u8>, transport::Error>,
    ) -> Vec<Effect> {
        let Some(index) = self.search_index.filter(|_| generation == self.search_generation) else {
            return Vec::new();
        };
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("bank search failed: {e}");
                return Vec::new();
            }
        };
        match autocomplete::parse_suggestions(&bytes) {
            Ok(suggestions) => vec![Effect::Host(HostEvent::Suggestions {
                index,
                input: SearchInput::Query,
                suggestions,
            })],
            Err(e) => {
                tracing::warn!("{e}");
                Vec::new()
            }
        }
    }
}

fn unknown_element(index: usize) -> Vec<Effect> {
    tracing::warn!("no matching element at index {index}");
    Vec::new()
}
