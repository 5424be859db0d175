//! Core of a server-driven XS2A wizard.
//!
//! A backend describes each step of a bank login, TAN or consent flow as a
//! list of form lines. This crate encrypts the requests, decodes the
//! responses into typed [definitions::FormLine]s, keeps the live elements of
//! the current page and runs the session state machine. Rendering is left to
//! the host.
//!
//! ```ignore
//! use std::sync::Arc;
//! use xs2a_wizard::config::Configuration;
//! use xs2a_wizard::presentation::{storage::MemoryStore, Session};
//!
//! let config = Configuration::new(session_key, "https://api.example.com/jsonp");
//! let (session, handle, updates) = Session::with_http(config, Arc::new(MemoryStore::new()))?;
//! ```
pub mod config;
pub mod decoder;
pub mod definitions;
pub mod presentation;
pub mod transport;
