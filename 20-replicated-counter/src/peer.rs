//! Outbound HTTP calls between the hub and replicas.
//!
//! Every call goes through one shared `reqwest::Client`. The optional timeout
//! passed to [`PeerClient::new`] bounds each call end to end; without it a
//! hung peer keeps its request in flight for as long as the socket lives.

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::Serialize;

use crate::{
    error::{CounterError, Result},
    message::{DeltaMessage, NodeRecord, Snapshot},
};

#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
}

impl PeerClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| CounterError::Startup(format!("http client build failed: {err}")))?;
        Ok(Self { client })
    }

    /// Hub → replica: `POST {endpoint}/sync/{id}/{delta}`.
    pub async fn push_delta(&self, endpoint: &str, id: &str, delta: i64) -> Result<()> {
        let url = url_for(endpoint, &["sync", id, &delta.to_string()])?;
        let response = self.client.post(url).send().await;
        expect_success(endpoint, response)?;
        Ok(())
    }

    /// Hub → replica: `POST {endpoint}/syncall` with the full mapping.
    pub async fn push_snapshot(&self, endpoint: &str, snapshot: &Snapshot) -> Result<()> {
        self.post_json(endpoint, "syncall", snapshot).await
    }

    /// Replica → hub: `POST {hub}/items` carrying the originating node id.
    pub async fn forward_update(&self, hub: &str, message: &DeltaMessage) -> Result<()> {
        self.post_json(hub, "items", message).await
    }

    /// Replica → hub: `POST {hub}/addnode`.
    pub async fn register(&self, hub: &str, record: &NodeRecord) -> Result<()> {
        self.post_json(hub, "addnode", record).await
    }

    /// Replica → hub: `POST {hub}/removenode`.
    pub async fn deregister(&self, hub: &str, record: &NodeRecord) -> Result<()> {
        self.post_json(hub, "removenode", record).await
    }

    async fn post_json<T>(&self, endpoint: &str, route: &str, body: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let url = url_for(endpoint, &[route])?;
        let response = self.client.post(url).json(body).send().await;
        expect_success(endpoint, response)?;
        Ok(())
    }
}

/// Appends percent-encoded path segments to `endpoint`, so counter ids with
/// `/` or spaces survive the trip.
fn url_for(endpoint: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|err| CounterError::peer(endpoint, err))?;
    url.path_segments_mut()
        .map_err(|_| CounterError::peer(endpoint, "endpoint cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn expect_success(
    endpoint: &str,
    response: std::result::Result<Response, reqwest::Error>,
) -> Result<()> {
    let response = response.map_err(|err| CounterError::peer(endpoint, err))?;
    if !response.status().is_success() {
        return Err(CounterError::peer(
            endpoint,
            format!("returned status {}", response.status()),
        ));
    }
    Ok(())
}
