//! The interactive side of a wizard session.
//!
//! [orchestrator::Orchestrator] turns backend responses into a [elements::Page]
//! of live elements and user input into requests. It performs no IO itself,
//! [session::Session] drives it on tokio against a [crate::transport::Transport]
//! and a [storage::SecureStore].
pub mod autocomplete;
pub mod elements;
pub mod orchestrator;
pub mod session;
pub mod storage;

pub use orchestrator::{Completion, Event, HostEvent, Orchestrator, UserAction};
pub use session::{Session, SessionHandle, Update};
