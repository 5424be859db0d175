//! Encrypted request transport.
//!
//! The [Transport] trait is the seam between the session driver and the
//! network. [HttpTransport] is the production implementation, tests script
//! their own.
use async_trait::async_trait;

pub mod cipher;
pub mod envelope;
pub mod http;

pub use envelope::{Envelope, Opener, Sealer};
pub use http::HttpTransport;

use crate::definitions::Payload;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("request could not be encrypted: {0}")]
    Encryption(envelope::Error),
    #[error("network failure: {0}")]
    Network(String),
    #[error("backend answered with status {0}")]
    Status(u16),
}

impl From<envelope::Error> for Error {
    fn from(e: envelope::Error) -> Self {
        match e {
            envelope::Error::Serialization(e) => Error::Serialization(e),
            other => Error::Encryption(other),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Status(status.as_u16()),
            None => Error::Network(e.to_string()),
        }
    }
}

/// Posts requests to the backend.
///
/// A request is cancelled by dropping the future returned from
/// [Transport::send]. Nothing is reported for it, implementations must
/// release the connection on drop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Encrypts and posts `payload`, returning the raw response body.
    async fn send(&self, payload: &Payload) -> Result<Vec<u8>, Error>;
}
