//! HTTP access to the remote voice catalogue.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use ureq::Agent;

use crate::error::{CoreError, CoreResult};

/// One entry of the remote voice list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVoice {
    pub id: String,
    pub name: String,
    #[serde(rename = "previewUrl", alias = "preview_url")]
    pub preview_url: String,
}

/// Byte fetcher behind the voice store, replaceable in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> CoreResult<Vec<u8>>;
}

/// Blocking HTTP GET with one global timeout covering connect and body.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> CoreResult<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| CoreError::network(url, e))?;

        let (_parts, body) = response.into_parts();
        let mut bytes = Vec::new();
        body.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| CoreError::network(url, e))?;
        Ok(bytes)
    }
}

/// Parse the catalogue body: a JSON array of voices.
pub fn parse_voice_list(bytes: &[u8]) -> CoreResult<Vec<RemoteVoice>> {
    serde_json::from_slice(bytes)
        .map_err(|e| CoreError::InvalidArgument(format!("malformed voice list: {e}")))
}
