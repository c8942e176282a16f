use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use mysql_drift_kubeapi::ClusterApi;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{DriftError, NodeCache};

/// What the node watch does once its stream fails or ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Stop the watch, leaving the cache frozen at its last state.
    #[default]
    Never,
    /// Re-open the watch after a delay that doubles from `initial` up to `max`.
    Backoff { initial: Duration, max: Duration },
}

/// Background task keeping a [`NodeCache`] current from the node watch.
#[derive(Debug)]
pub struct NodeWatch<A> {
    api: Arc<A>,
    cache: Arc<NodeCache>,
    restart: RestartPolicy,
    initialize: Option<Duration>,
}

enum Outcome {
    Cancelled,
    Closed,
    Failed(DriftError),
}

impl<A: ClusterApi> NodeWatch<A> {
    pub fn new(api: Arc<A>, cache: Arc<NodeCache>) -> Self {
        Self {
            api,
            cache,
            restart: RestartPolicy::default(),
            initialize: None,
        }
    }

    pub fn restart(self, restart: RestartPolicy) -> Self {
        Self { restart, ..self }
    }

    /// Fill the cache from a full node listing before watching, retrying
    /// every `period` until the listing succeeds.
    ///
    pub fn initialize_first(self, period: Duration) -> Self {
        Self {
            initialize: Some(period),
            ..self
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<Result<(), DriftError>> {
        tokio::spawn(self.run(token))
    }

    /// Apply watch events to the cache until `token` is cancelled.
    ///
    /// With [`RestartPolicy::Never`] this also returns when the stream ends
    /// (`Ok`) or fails (`Err`), and the cache reports
    /// [`is_watch_stopped`](NodeCache::is_watch_stopped).
    ///
    pub async fn run(self, token: CancellationToken) -> Result<(), DriftError> {
        let initialized = match self.initialize {
            Some(period) => self
                .cache
                .initialize_with_retry(self.api.as_ref(), period, &token)
                .await
                .is_some(),
            None => true,
        };
        if !initialized {
            tracing::info!("Node watch cancelled before the cache was initialized");
            return Ok(());
        }

        let mut delay = RestartDelay::new(self.restart);
        self.cache.set_watch_stopped(false);
        loop {
            tracing::info!("Starting node watch");
            let err = match self.watch(&token, &mut delay).await {
                Outcome::Cancelled => {
                    tracing::info!("Node watch cancelled");
                    return Ok(());
                }
                Outcome::Closed => {
                    tracing::warn!("Node watch stream ended");
                    None
                }
                Outcome::Failed(err) => {
                    tracing::error!(?err, "Node watch stream failed");
                    Some(err)
                }
            };

            let Some(wait) = delay.next_delay() else {
                self.cache.set_watch_stopped(true);
                return err.map_or(Ok(()), Err);
            };

            tracing::info!(?wait, "Restarting node watch");
            tokio::select! {
                biased;
                () = token.cancelled() => return Ok(()),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn watch(&self, token: &CancellationToken, delay: &mut RestartDelay) -> Outcome {
        let mut events = self.api.watch_nodes();
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return Outcome::Cancelled,
                next = events.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    delay.reset();
                    self.cache.apply(event).await;
                }
                Some(Err(err)) => return Outcome::Failed(DriftError::watch(err)),
                None => return Outcome::Closed,
            }
        }
    }
}

#[derive(Debug)]
struct RestartDelay {
    restart: RestartPolicy,
    next: Option<Duration>,
}

impl RestartDelay {
    fn new(restart: RestartPolicy) -> Self {
        Self {
            restart,
            next: None,
        }
    }

    fn next_delay(&mut self) -> Option<Duration> {
        match self.restart {
            RestartPolicy::Never => None,
            RestartPolicy::Backoff { initial, max } => {
                let delay = self.next.unwrap_or(initial).min(max);
                self.next = Some(delay.saturating_mul(2).min(max));
                Some(delay)
            }
        }
    }

    fn reset(&mut self) {
        self.next = None;
    }
}
