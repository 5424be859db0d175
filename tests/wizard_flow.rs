mod common;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;

use xs2a_wizard::config;
use xs2a_wizard::definitions::{SessionErrorKind, WizardStep};
use xs2a_wizard::presentation::orchestrator::Lifecycle;
use xs2a_wizard::presentation::session::Error;
use xs2a_wizard::presentation::storage::{MemoryStore, SecureStore};
use xs2a_wizard::presentation::{Completion, Event, HostEvent, Session, Update, UserAction};
use xs2a_wizard::transport;

use crate::common::{fixture, next_page, spawn_session, wait_for, Reply, ScriptedTransport};

// Element positions on tests/data/login.json: paragraph, user name, PIN,
// the inserted store-credentials checkbox, submit and back.
const USER_NAME: usize = 1;
const USER_PIN: usize = 2;
const STORE_CREDENTIALS: usize = 3;
const SUBMIT: usize = 4;

#[tokio::test]
async fn login_and_store_credentials() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("login.json")?, fixture("finish.json")?]);
    let store = Arc::new(MemoryStore::new());
    let (session, handle, mut updates) = spawn_session(transport.clone(), store.clone())?;

    assert_eq!(next_page(&mut updates).await?, 6);
    handle.user(UserAction::SetText {
        index: USER_NAME,
        value: "jane".into(),
    })?;
    handle.user(UserAction::SetText {
        index: USER_PIN,
        value: "1234".into(),
    })?;
    handle.user(UserAction::Toggle {
        index: STORE_CREDENTIALS,
    })?;
    handle.user(UserAction::Press { index: SUBMIT })?;

    assert_eq!(
        session.await?,
        Completion::FinishedWithCredential("xs2a-credential-7f3a".into())
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].get("client"), Some(&json!("rust_sdk")));
    assert_eq!(sent[1].action(), Some("submit"));
    assert_eq!(sent[1].get("USER_NAME"), Some(&json!("jane")));
    assert_eq!(sent[1].get("USER_PIN"), Some(&json!("1234")));

    assert_eq!(
        store.fetch("testbank_USER_PIN", "").await?,
        Some("1234".to_string())
    );
    assert_eq!(store.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn hidden_sub_form_is_not_submitted() -> Result<()> {
    let transport =
        ScriptedTransport::new([fixture("multi_login.json")?, fixture("finish.json")?]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    // multi (0), PIN sub-form (1, 2), token sub-form (3), hidden (4), submit (5)
    assert_eq!(next_page(&mut updates).await?, 6);
    handle.user(UserAction::SetText {
        index: 1,
        value: "jane".into(),
    })?;
    handle.user(UserAction::SelectSubForm {
        index: 0,
        value: "token".into(),
    })?;
    handle.user(UserAction::SetText {
        index: 3,
        value: "998877".into(),
    })?;
    handle.user(UserAction::Press { index: 5 })?;

    assert!(session.await?.is_success());
    let submitted = &transport.sent()[1];
    assert_eq!(submitted.get("login_type"), Some(&json!("token")));
    assert_eq!(submitted.get("TOKEN"), Some(&json!("998877")));
    assert_eq!(submitted.get("session_state"), Some(&json!("a1")));
    assert!(!submitted.contains_key("USER_NAME"));
    assert!(!submitted.contains_key("USER_PIN"));
    Ok(())
}

#[tokio::test]
async fn required_field_blocks_the_request() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("login.json")?]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    next_page(&mut updates).await?;
    handle.user(UserAction::Press { index: SUBMIT })?;
    let errors = wait_for(&mut updates, |update| match update {
        Update::Host(HostEvent::ValidationFailed { errors }) => Some(errors),
        _ => None,
    })
    .await?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name, "USER_NAME");
    assert_eq!(transport.sent().len(), 1);

    session.abort();
    Ok(())
}

#[tokio::test]
async fn transport_failure_ends_the_session() -> Result<()> {
    let transport = ScriptedTransport::new([Reply::Fail(transport::Error::Status(503))]);
    let (session, _handle, mut updates) =
        spawn_session(transport, Arc::new(MemoryStore::new()))?;

    assert_eq!(session.await?, Completion::NetworkError);
    let completed = wait_for(&mut updates, |update| match update {
        Update::Completed(completion) => Some(completion),
        _ => None,
    })
    .await?;
    assert_eq!(completed, Completion::NetworkError);
    Ok(())
}

#[tokio::test]
async fn session_error_keeps_the_flow_going() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("tan.json")?]);
    let (session, handle, mut updates) =
        spawn_session(transport, Arc::new(MemoryStore::new()))?;

    let error = wait_for(&mut updates, |update| match update {
        Update::Host(HostEvent::SessionError { error }) => Some(error),
        _ => None,
    })
    .await?;
    assert_eq!(error.kind, SessionErrorKind::TanFailed);
    assert!(error.recoverable);
    next_page(&mut updates).await?;

    handle.send(Event::DismissRequested)?;
    wait_for(&mut updates, |update| {
        matches!(update, Update::Host(HostEvent::ConfirmAbort)).then_some(())
    })
    .await?;
    handle.send(Event::AbortConfirmed { confirmed: true })?;
    assert_eq!(session.await?, Completion::UserAborted);
    Ok(())
}

#[tokio::test]
async fn offline_request_is_resynced() -> Result<()> {
    let transport = ScriptedTransport::new([
        fixture("login.json")?,
        Reply::Hang,
        fixture("login.json")?,
        fixture("finish.json")?,
    ]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    next_page(&mut updates).await?;
    handle.user(UserAction::SetText {
        index: USER_NAME,
        value: "jane".into(),
    })?;
    handle.user(UserAction::Press { index: SUBMIT })?;
    wait_for(&mut updates, |update| {
        matches!(update, Update::Loading(true)).then_some(())
    })
    .await?;

    handle.send(Event::Connectivity { online: false })?;
    wait_for(&mut updates, |update| {
        matches!(update, Update::Host(HostEvent::Offline { offline: true })).then_some(())
    })
    .await?;
    handle.send(Event::Connectivity { online: true })?;
    next_page(&mut updates).await?;

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1].action(), Some("submit"));
    assert!(sent[2].is_empty());

    // The page came back with its fields reset.
    handle.user(UserAction::SetText {
        index: USER_NAME,
        value: "jane".into(),
    })?;
    handle.user(UserAction::Press { index: SUBMIT })?;
    assert!(session.await?.is_success());
    Ok(())
}

#[tokio::test]
async fn request_cancelled_before_it_starts_never_reaches_the_backend() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("login.json")?, fixture("login.json")?]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    next_page(&mut updates).await?;
    // Queued back to back, the session handles all three before the send
    // task gets a chance to run.
    handle.user(UserAction::SetText {
        index: USER_NAME,
        value: "jane".into(),
    })?;
    handle.user(UserAction::Press { index: SUBMIT })?;
    handle.send(Event::Connectivity { online: false })?;
    wait_for(&mut updates, |update| {
        matches!(update, Update::Host(HostEvent::Offline { offline: true })).then_some(())
    })
    .await?;
    tokio::task::yield_now().await;
    assert_eq!(transport.sent().len(), 1);

    handle.send(Event::Connectivity { online: true })?;
    next_page(&mut updates).await?;
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].is_empty());

    session.abort();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn autosubmit_fires_after_its_interval() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("loading.json")?, fixture("finish.json")?]);
    let (session, _handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    let step = wait_for(&mut updates, |update| match update {
        Update::Host(HostEvent::StepChanged { step }) => Some(step),
        _ => None,
    })
    .await?;
    assert_eq!(step, WizardStep::Accounts);

    assert!(session.await?.is_success());
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].action(), Some("autosubmit"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn background_pauses_autosubmit() -> Result<()> {
    let transport = ScriptedTransport::new([fixture("loading.json")?, fixture("finish.json")?]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    next_page(&mut updates).await?;
    handle.send(Event::Lifecycle(Lifecycle::Background))?;
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    assert_eq!(transport.sent().len(), 1);

    handle.send(Event::Lifecycle(Lifecycle::Foreground))?;
    assert!(session.await?.is_success());
    assert_eq!(transport.sent()[1].action(), Some("autosubmit"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn bank_search_waits_for_typing_to_pause() -> Result<()> {
    let page = json!({"callback": "bank", "form": [
        {"type": "text", "name": "bank_code", "label": "Bank", "autocomplete_action": "complete-bankcodes"}
    ]});
    let suggestions = json!({"autocomplete": {"data": [{
        "label": "Sparkasse", "value": "20050550",
        "object": {"name": "Sparkasse", "city": "Hamburg", "bank_code": "20050550", "bic": "HASPDEHHXXX"}
    }]}});
    let transport = ScriptedTransport::new([
        Reply::Body(serde_json::to_vec(&page)?),
        Reply::Body(serde_json::to_vec(&suggestions)?),
    ]);
    let (session, handle, mut updates) =
        spawn_session(transport.clone(), Arc::new(MemoryStore::new()))?;

    next_page(&mut updates).await?;
    handle.user(UserAction::Search {
        index: 0,
        query: "Spar".into(),
    })?;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.user(UserAction::Search {
        index: 0,
        query: "Sparkasse".into(),
    })?;

    let found = wait_for(&mut updates, |update| match update {
        Update::Host(HostEvent::Suggestions { suggestions, .. }) => Some(suggestions),
        _ => None,
    })
    .await?;
    assert_eq!(found.len(), 1);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].action(), Some("complete-bankcodes"));
    assert_eq!(sent[1].get("bank_code"), Some(&json!("Sparkasse")));

    session.abort();
    Ok(())
}

#[tokio::test]
async fn stored_credentials_are_offered_and_submitted() -> Result<()> {
    let store = Arc::new(MemoryStore::with_prompt());
    store.set("testbank_USER_NAME", "jane").await?;
    store.set("testbank_USER_PIN", "1234").await?;
    let transport = ScriptedTransport::new([fixture("login.json")?, fixture("finish.json")?]);
    let (session, handle, mut updates) = spawn_session(transport.clone(), store)?;

    let page = wait_for(&mut updates, |update| match update {
        Update::Host(HostEvent::OfferAutofill { page }) => Some(page),
        _ => None,
    })
    .await?;
    handle.send(Event::AutofillAnswered {
        page,
        accepted: true,
    })?;

    assert!(session.await?.is_success());
    let submitted = transport
        .sent()
        .into_iter()
        .nth(1)
        .ok_or_else(|| anyhow!("autofill did not submit"))?;
    assert_eq!(submitted.action(), Some("submit"));
    assert_eq!(submitted.get("USER_NAME"), Some(&json!("jane")));
    assert_eq!(submitted.get("USER_PIN"), Some(&json!("1234")));
    Ok(())
}

#[test]
fn invalid_configuration_is_rejected() {
    let transport = ScriptedTransport::new(Vec::new());
    let result = Session::new(
        common::config().with_language(config::Language::En),
        transport.clone(),
        Arc::new(MemoryStore::new()),
    );
    assert!(result.is_ok());

    let result = Session::new(
        config::Configuration::new("", "https://api.example.com/jsonp"),
        transport,
        Arc::new(MemoryStore::new()),
    );
    assert!(matches!(
        result,
        Err(Error::Config(config::Error::MissingSessionKey))
    ));
}
