//! Shared harness: real hubs and replicas on ephemeral localhost ports.

#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use replicated_counter::{
    config::{HubConfig, ReplicaConfig},
    hub::{Hub, HubState},
    message::{CounterMessage, DeltaMessage, Snapshot},
    replica::{Replica, ReplicaAgent},
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub const WAIT: Duration = Duration::from_secs(3);
pub const PEER_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestHub {
    pub url: String,
    pub state: HubState,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl TestHub {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(Vec::new()).await
    }

    pub async fn spawn_with(initial_nodes: Vec<String>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let mut config = HubConfig::new(listener.local_addr()?);
        config.initial_nodes = initial_nodes;
        config.peer_timeout = Some(PEER_TIMEOUT);

        let hub = Hub::new(listener, config)?;
        let url = format!("http://{}", hub.local_addr()?);
        let state = hub.state().clone();

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(hub.run_until(async move {
            let _ = signal.await;
        }));

        Ok(Self {
            url,
            state,
            shutdown,
            task,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await??;
        Ok(())
    }
}

pub struct TestReplica {
    pub url: String,
    pub agent: Arc<ReplicaAgent>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl TestReplica {
    /// Binds, registers with `hub_url` and starts serving.
    pub async fn spawn(hub_url: &str, node_id: &str) -> Result<Self> {
        let replica = register(hub_url, node_id).await?;
        let url = format!("http://{}", replica.local_addr()?);
        let agent = Arc::clone(replica.agent());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(replica.run_until(async move {
            let _ = signal.await;
        }));

        Ok(Self {
            url,
            agent,
            shutdown,
            task,
        })
    }

    pub fn read(&self, id: &str) -> i64 {
        self.agent.store().read(id)
    }

    /// Stops serving; the replica deregisters from its hub on the way out.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await??;
        Ok(())
    }
}

pub async fn register(hub_url: &str, node_id: &str) -> Result<Replica> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let mut config = ReplicaConfig::new(node_id, listener.local_addr()?, hub_url);
    config.peer_timeout = Some(PEER_TIMEOUT);
    Ok(Replica::register(listener, config.validate()?).await?)
}

/// An http endpoint nothing is listening on.
pub async fn unused_endpoint() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

pub async fn post_update(url: &str, id: &str, count: i64) -> Result<CounterMessage> {
    post_delta(url, &DeltaMessage::new(id, count)).await
}

pub async fn post_delta(url: &str, message: &DeltaMessage) -> Result<CounterMessage> {
    let response = reqwest::Client::new()
        .post(format!("{url}/items"))
        .json(message)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

pub async fn get_count(url: &str, id: &str) -> Result<i64> {
    let message: CounterMessage = reqwest::get(format!("{url}/items/{id}/count"))
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(message.count)
}

pub async fn get_all(url: &str) -> Result<Snapshot> {
    Ok(reqwest::get(format!("{url}/items"))
        .await?
        .error_for_status()?
        .json()
        .await?)
}

pub async fn post_empty(url: &str) -> Result<reqwest::StatusCode> {
    Ok(reqwest::Client::new().post(url).send().await?.status())
}

/// Polls `GET /items/{id}/count` on `url` until it reports `expected`.
pub async fn wait_for_count(url: &str, id: &str, expected: i64) -> Result<()> {
    let start = tokio::time::Instant::now();
    let mut last = None;
    while start.elapsed() < WAIT {
        last = get_count(url, id).await.ok();
        if last == Some(expected) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("{url} never reported {id}={expected}, last saw {last:?}")
}

/// Polls an in-process condition, such as hub registry state.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < WAIT {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub async fn with_timeout<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(WAIT, future)
        .await
        .context("timed out")?
}
