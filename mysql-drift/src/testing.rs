//! In-memory [`ClusterApi`] for exercising the detector without a cluster.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use mysql_drift_ext::corev1;
use mysql_drift_kubeapi::{ClusterApi, NodeEvent};

/// A call recorded by [`FakeCluster`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ListNodes,
    WatchNodes,
    ListPods(String),
    Evict { namespace: String, name: String },
    Delete { namespace: String, name: String },
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("fake cluster failure: {0}")]
pub struct FakeError(String);

impl FakeError {
    pub fn new(message: impl ToString) -> Self {
        Self(message.to_string())
    }
}

#[derive(Debug)]
struct WatchScript {
    events: Vec<Result<NodeEvent, FakeError>>,
    close: bool,
}

/// Scripted cluster: fixed nodes, pods per label selector, injectable
/// failures and node watch streams, plus an ordered log of every call.
///
#[derive(Debug, Default)]
pub struct FakeCluster {
    nodes: Vec<corev1::Node>,
    pods: HashMap<String, Vec<corev1::Pod>>,
    list_nodes_failures: AtomicUsize,
    fail_list_pods: bool,
    fail_evict: bool,
    fail_delete: bool,
    watches: Mutex<VecDeque<WatchScript>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(self, nodes: Vec<corev1::Node>) -> Self {
        Self { nodes, ..self }
    }

    pub fn with_pods(mut self, selector: &str, pods: Vec<corev1::Pod>) -> Self {
        self.pods.insert(selector.to_string(), pods);
        self
    }

    pub fn failing_list_nodes(self) -> Self {
        self.failing_list_nodes_times(usize::MAX)
    }

    /// Fail the next `times` node listings, then succeed.
    pub fn failing_list_nodes_times(self, times: usize) -> Self {
        Self {
            list_nodes_failures: AtomicUsize::new(times),
            ..self
        }
    }

    pub fn failing_list_pods(self) -> Self {
        Self {
            fail_list_pods: true,
            ..self
        }
    }

    pub fn failing_evict(self) -> Self {
        Self {
            fail_evict: true,
            ..self
        }
    }

    pub fn failing_delete(self) -> Self {
        Self {
            fail_delete: true,
            ..self
        }
    }

    /// Queue a watch that yields `events` and then stays open.
    pub fn with_watch(self, events: Vec<Result<NodeEvent, FakeError>>) -> Self {
        self.script_watch(events, false)
    }

    /// Queue a watch that yields `events` and then ends.
    pub fn with_closed_watch(self, events: Vec<Result<NodeEvent, FakeError>>) -> Self {
        self.script_watch(events, true)
    }

    fn script_watch(self, events: Vec<Result<NodeEvent, FakeError>>, close: bool) -> Self {
        lock(&self.watches).push_back(WatchScript { events, close });
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn outcome(&self, fail: bool, operation: &str) -> Result<(), FakeError> {
        if fail {
            Err(FakeError::new(format!("{operation} refused")))
        } else {
            Ok(())
        }
    }
}

impl ClusterApi for FakeCluster {
    type Error = FakeError;

    async fn list_nodes(&self) -> Result<Vec<corev1::Node>, Self::Error> {
        self.record(Call::ListNodes);
        #[allow(deprecated_in_future)]
        let fail = self
            .list_nodes_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                left => Some(left - 1),
            })
            .is_ok();
        self.outcome(fail, "list nodes")?;
        Ok(self.nodes.clone())
    }

    /// Watches open in the order they were queued; once the queue is empty
    /// the watch stays open without events.
    fn watch_nodes(&self) -> BoxStream<'static, Result<NodeEvent, Self::Error>> {
        self.record(Call::WatchNodes);
        match lock(&self.watches).pop_front() {
            Some(WatchScript {
                events,
                close: true,
            }) => stream::iter(events).boxed(),
            Some(WatchScript {
                events,
                close: false,
            }) => stream::iter(events).chain(stream::pending()).boxed(),
            None => stream::pending().boxed(),
        }
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<corev1::Pod>, Self::Error> {
        self.record(Call::ListPods(selector.to_string()));
        self.outcome(self.fail_list_pods, "list pods")?;
        Ok(self.pods.get(selector).cloned().unwrap_or_default())
    }

    async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), Self::Error> {
        self.record(Call::Evict {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.outcome(self.fail_evict, "evict")
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Self::Error> {
        self.record(Call::Delete {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.outcome(self.fail_delete, "delete")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
