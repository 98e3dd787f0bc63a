//! Client-side status polling.
//!
//! The presentation adapter mirrors the served vehicle by polling
//! `GetStatus` on the tick cadence. A failed fetch is logged and leaves the
//! last-known value stale until the next successful poll; retry beyond the
//! next scheduled poll is the adapter's business, not ours.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tonic::transport::Channel;

use crate::error::{ExecutionError, FleetError, FleetResult, TransportError};
use crate::snapshot::BusStatus;

use super::proto::bus_service_client::BusServiceClient;
use super::proto::StatusRequest;

/// Connects a bus service client to an endpoint such as
/// `http://127.0.0.1:50051`.
///
/// # Errors
///
/// Returns [`TransportError::ConnectionFailed`] if the endpoint is
/// malformed or unreachable.
pub async fn connect(endpoint: impl Into<String>) -> FleetResult<BusServiceClient<Channel>> {
    let endpoint = endpoint.into();
    BusServiceClient::connect(endpoint.clone())
        .await
        .map_err(|e| {
            FleetError::Transport(TransportError::ConnectionFailed {
                message: format!("{endpoint}: {e}"),
            })
        })
}

/// A background poller publishing the latest [`BusStatus`].
///
/// Updates arrive through a `watch` channel: observers read the most
/// recent value and never queue. Cancelling (or dropping) the poller stops
/// the polling task; no further updates are published after `cancel`
/// returns.
#[derive(Debug)]
pub struct StatusPoller {
    updates: watch::Receiver<Option<BusStatus>>,
    task: JoinHandle<()>,
}

impl StatusPoller {
    /// Spawns a poller on the current tokio runtime.
    ///
    /// `period` should match the server's tick cadence; the first poll
    /// fires immediately.
    #[must_use]
    pub fn spawn(client: BusServiceClient<Channel>, period: Duration) -> Self {
        let (tx, updates) = watch::channel(None);
        let task = tokio::spawn(poll_loop(client, period, tx));
        Self { updates, task }
    }

    /// The most recently fetched status, if any poll has succeeded yet.
    #[must_use]
    pub fn latest(&self) -> Option<BusStatus> {
        self.updates.borrow().clone()
    }

    /// A receiver observing every published update.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<Option<BusStatus>> {
        self.updates.clone()
    }

    /// Waits until the next update is published.
    ///
    /// # Errors
    ///
    /// Returns a disconnection error once the poller has been cancelled.
    pub async fn changed(&mut self) -> FleetResult<()> {
        self.updates.changed().await.map_err(|_| {
            FleetError::Execution(ExecutionError::Disconnected {
                path: "status_poller".to_string(),
            })
        })
    }

    /// Stops polling.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    mut client: BusServiceClient<Channel>,
    period: Duration,
    tx: watch::Sender<Option<BusStatus>>,
) {
    let mut interval = tokio::time::interval(period);
    // A suspended client resumes polling from "now"; missed polls are not
    // replayed.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if tx.is_closed() {
            break;
        }

        match fetch_status(&mut client).await {
            Ok(status) => {
                tx.send_replace(Some(status));
            }
            Err(err) => {
                tracing::warn!(error = %err, "status fetch failed; keeping last known state");
            }
        }
    }
}

async fn fetch_status(client: &mut BusServiceClient<Channel>) -> FleetResult<BusStatus> {
    let reply = client.get_status(StatusRequest {}).await.map_err(|status| {
        FleetError::Transport(TransportError::ServerError {
            code: status.code() as u32,
            message: status.message().to_string(),
        })
    })?;

    serde_json::from_slice(&reply.into_inner().status_json).map_err(|e| {
        FleetError::Transport(TransportError::DeserializationFailed {
            message: e.to_string(),
        })
    })
}
