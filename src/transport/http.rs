use async_trait::async_trait;
use url::Url;

use super::{Error, Sealer, Transport};
use crate::config::{self, Configuration};
use crate::definitions::Payload;

/// Posts sealed payloads to the configured endpoint with `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    session_key: String,
    sealer: Sealer,
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("http client could not be built: {0}")]
    Client(#[from] reqwest::Error),
}

impl HttpTransport {
    pub fn new(config: &Configuration, sealer: Sealer) -> Result<Self, SetupError> {
        config.validate()?;
        let endpoint = Url::parse(&config.base_url).map_err(config::Error::from)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            session_key: config.session_key.clone(),
            sealer,
        })
    }

    async fn post(&self, payload: &Payload) -> Result<Vec<u8>, Error> {
        let envelope = self.sealer.seal(payload, &self.session_key)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("backend answered with {status}");
            return Err(Error::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &Payload) -> Result<Vec<u8>, Error> {
        tracing::debug!(
            action = payload.action().unwrap_or("none"),
            "posting request"
        );
        self.post(payload).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_invalid_configuration() {
        let sealer = Sealer::backend().unwrap();
        let config = Configuration::new("key", "not a url");
        assert!(matches!(
            HttpTransport::new(&config, sealer.clone()),
            Err(SetupError::Config(config::Error::InvalidBaseUrl(_)))
        ));
        let config = Configuration::new("key", "https://example.com/jsonp");
        assert!(HttpTransport::new(&config, sealer).is_ok());
    }
}
