//! HTTP backend for the remote store endpoint.
//!
//! `GET <endpoint>?t=<millis>` returns the whole dataset; `POST <endpoint>`
//! with a [`StoreAction`] body performs a write. The POST response body is
//! never read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::{
    errors::Result,
    models::Snapshot,
    store::{StoreAction, StoreBackend, payload},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Remote store reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteStore {
    /// Creates a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint this client talks to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StoreBackend for RemoteStore {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Result<Snapshot> {
        // cache buster
        let t = Utc::now().timestamp_millis().to_string();
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("t", t.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), "Fetched store payload");
        payload::decode_snapshot_str(&body)
    }

    #[instrument(skip(self, action), fields(action = action.name()))]
    async fn apply(&self, action: &StoreAction) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(action)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
