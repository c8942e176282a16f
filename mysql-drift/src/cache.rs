use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kube::ResourceExt as _;
use mysql_drift_ext as k8s;
use mysql_drift_kubeapi::{ClusterApi, NodeEvent};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use k8s::NodeExt as _;
use k8s::corev1;

use crate::DriftError;

/// Last known state of every node, keyed by node name.
///
/// Records are stored behind `Arc` and swapped whole on every update, so a
/// reader always holds a complete node object even if a newer one lands
/// right after the lookup.
///
#[derive(Debug, Default)]
pub struct NodeCache {
    records: RwLock<Records>,
    initialized: AtomicBool,
    watch_stopped: AtomicBool,
    prune_deleted: bool,
}

#[derive(Debug, Default)]
struct Records {
    nodes: HashMap<String, Arc<corev1::Node>>,
    /// Names delivered since the watch started re-listing.
    relisted: Option<HashSet<String>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries for nodes that no longer exist.
    ///
    /// A node is dropped when the watch reports it deleted, and when a
    /// re-list completes without it. The second case covers nodes removed
    /// while the watch was desynced, which never produce a delete event.
    ///
    /// Off by default: removed nodes stay cached with their last status.
    ///
    pub fn prune_deleted(self, prune_deleted: bool) -> Self {
        Self {
            prune_deleted,
            ..self
        }
    }

    /// Populate the cache from a full node listing, replacing any previous contents.
    ///
    /// On failure the cache is left untouched and drift queries should not be
    /// considered reliable.
    ///
    pub async fn initialize<A: ClusterApi>(&self, api: &A) -> Result<usize, DriftError> {
        let nodes = api
            .list_nodes()
            .await
            .map_err(|err| DriftError::query("list nodes", err))?;
        let nodes = nodes
            .into_iter()
            .map(|node| (node.name_any(), Arc::new(node)))
            .collect::<HashMap<_, _>>();
        let count = nodes.len();
        self.records.write().await.nodes = nodes;
        self.initialized.store(true, Ordering::Release);
        tracing::info!(count, "Node cache initialized");
        Ok(count)
    }

    /// Call [`initialize`](Self::initialize) every `period` until it succeeds.
    ///
    /// Returns `None` if `token` is cancelled first.
    ///
    pub async fn initialize_with_retry<A: ClusterApi>(
        &self,
        api: &A,
        period: Duration,
        token: &CancellationToken,
    ) -> Option<usize> {
        loop {
            match self.initialize(api).await {
                Ok(count) => return Some(count),
                Err(err) => tracing::warn!(?err, ?period, "Node cache initialization failed"),
            }
            tokio::select! {
                biased;
                () = token.cancelled() => return None,
                () = tokio::time::sleep(period) => {}
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether the node watch has given up, leaving the cache frozen.
    pub fn is_watch_stopped(&self) -> bool {
        self.watch_stopped.load(Ordering::Acquire)
    }

    pub(crate) fn set_watch_stopped(&self, stopped: bool) {
        self.watch_stopped.store(stopped, Ordering::Release);
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<corev1::Node>> {
        self.records.read().await.nodes.get(name).cloned()
    }

    /// Readiness of a cached node, `None` if the node was never observed.
    pub async fn is_ready(&self, name: &str) -> Option<bool> {
        self.lookup(name).await.map(|node| node.is_ready())
    }

    pub async fn apply(&self, event: NodeEvent) {
        match event {
            NodeEvent::Applied(node) => self.replace(node).await,
            NodeEvent::Deleted(node) if self.prune_deleted => {
                self.remove(&node.name_any()).await;
            }
            NodeEvent::Deleted(node) => {
                tracing::debug!(name = node.name_any(), "Keeping deleted node in cache");
            }
            NodeEvent::Relisting => {
                tracing::debug!("Node watch re-listing");
                self.records.write().await.relisted = Some(HashSet::new());
            }
            NodeEvent::Relisted => self.finish_relist().await,
        }
    }

    pub async fn replace(&self, node: corev1::Node) {
        let name = node.name_any();
        tracing::debug!(name, ready = node.is_ready(), "Node updated");
        let mut records = self.records.write().await;
        if let Some(relisted) = records.relisted.as_mut() {
            relisted.insert(name.clone());
        }
        records.nodes.insert(name, Arc::new(node));
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<corev1::Node>> {
        tracing::debug!(name, "Node removed");
        self.records.write().await.nodes.remove(name)
    }

    async fn finish_relist(&self) {
        let mut records = self.records.write().await;
        let Some(relisted) = records.relisted.take() else {
            return;
        };
        if !self.prune_deleted {
            return;
        }
        let before = records.nodes.len();
        records.nodes.retain(|name, _| relisted.contains(name));
        let pruned = before - records.nodes.len();
        if pruned > 0 {
            tracing::info!(pruned, "Pruned nodes missing from re-list");
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use k8s::ObjectMetaExt as _;
    use k8s::metav1;

    use crate::testing::{Call, FakeCluster};

    use super::*;

    fn node(name: &str, status: &str) -> corev1::Node {
        corev1::Node::with_ready_status(name, status)
    }

    #[tokio::test]
    async fn initialize_caches_every_listed_node() {
        let api = FakeCluster::new().with_nodes(vec![
            node("node-a", "True"),
            node("node-b", "False"),
            node("node-c", "Unknown"),
        ]);
        let cache = NodeCache::new();

        let count = cache.initialize(&api).await.unwrap();

        assert_eq!(count, 3);
        assert!(cache.is_initialized());
        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.is_ready("node-a").await, Some(true));
        assert_eq!(cache.is_ready("node-b").await, Some(false));
        assert_eq!(cache.is_ready("node-c").await, Some(false));
        assert!(cache.lookup("node-d").await.is_none());
    }

    #[tokio::test]
    async fn initialize_replaces_previous_contents() {
        let cache = NodeCache::new();
        cache.replace(node("stale", "True")).await;

        let api = FakeCluster::new().with_nodes(vec![node("node-a", "True")]);
        cache.initialize(&api).await.unwrap();

        assert!(cache.lookup("stale").await.is_none());
        assert!(cache.lookup("node-a").await.is_some());
    }

    #[tokio::test]
    async fn failed_initialize_leaves_cache_empty() {
        let api = FakeCluster::new()
            .with_nodes(vec![node("node-a", "True")])
            .failing_list_nodes();
        let cache = NodeCache::new();

        let err = cache.initialize(&api).await.unwrap_err();

        assert!(matches!(err, DriftError::ClusterQuery { .. }));
        assert_eq!(err.operation(), Some("list nodes"));
        assert!(!cache.is_initialized());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn update_replaces_whole_record() {
        let cache = NodeCache::new();
        let mut old = node("node-a", "True");
        old.metadata = metav1::ObjectMeta::new("node-a").label("zone", "eu-1");
        cache.replace(old).await;

        let new = node("node-a", "False");
        cache.apply(NodeEvent::Applied(new.clone())).await;

        let cached = cache.lookup("node-a").await.unwrap();
        assert_eq!(*cached, new);
        assert!(cached.metadata.labels.is_none());
        assert!(!cached.is_ready());
    }

    #[tokio::test]
    async fn update_for_unseen_node_inserts_it() {
        let cache = NodeCache::new();
        cache
            .apply(NodeEvent::Applied(node("node-new", "True")))
            .await;
        assert_eq!(cache.is_ready("node-new").await, Some(true));
    }

    #[tokio::test]
    async fn held_records_survive_replacement() {
        let cache = NodeCache::new();
        cache.replace(node("node-a", "True")).await;

        let before = cache.lookup("node-a").await.unwrap();
        cache.replace(node("node-a", "False")).await;

        assert!(before.is_ready());
        assert_eq!(cache.is_ready("node-a").await, Some(false));
    }

    #[tokio::test]
    async fn deleted_nodes_are_kept_by_default() {
        let cache = NodeCache::new();
        cache.replace(node("node-a", "False")).await;

        cache
            .apply(NodeEvent::Deleted(node("node-a", "False")))
            .await;

        assert_eq!(cache.is_ready("node-a").await, Some(false));
    }

    #[tokio::test]
    async fn deleted_nodes_are_pruned_when_enabled() {
        let cache = NodeCache::new().prune_deleted(true);
        cache.replace(node("node-a", "False")).await;
        cache.replace(node("node-b", "True")).await;

        cache
            .apply(NodeEvent::Deleted(node("node-a", "False")))
            .await;

        assert!(cache.lookup("node-a").await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    async fn relist(cache: &NodeCache, names: &[&str]) {
        cache.apply(NodeEvent::Relisting).await;
        for name in names {
            cache.apply(NodeEvent::Applied(node(name, "True"))).await;
        }
        cache.apply(NodeEvent::Relisted).await;
    }

    #[tokio::test]
    async fn relist_prunes_nodes_it_did_not_deliver() {
        let cache = NodeCache::new().prune_deleted(true);
        cache.replace(node("node-a", "False")).await;
        cache.replace(node("node-b", "False")).await;

        relist(&cache, &["node-b", "node-c"]).await;

        assert!(cache.lookup("node-a").await.is_none());
        assert_eq!(cache.is_ready("node-b").await, Some(true));
        assert_eq!(cache.is_ready("node-c").await, Some(true));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn relist_keeps_missing_nodes_by_default() {
        let cache = NodeCache::new();
        cache.replace(node("node-a", "False")).await;

        relist(&cache, &["node-b"]).await;

        assert_eq!(cache.is_ready("node-a").await, Some(false));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn relist_done_without_start_prunes_nothing() {
        let cache = NodeCache::new().prune_deleted(true);
        cache.replace(node("node-a", "True")).await;

        cache.apply(NodeEvent::Relisted).await;

        assert!(cache.lookup("node-a").await.is_some());
    }

    #[tokio::test]
    async fn initialize_retries_until_listing_succeeds() {
        let api = FakeCluster::new()
            .with_nodes(vec![node("node-a", "True")])
            .failing_list_nodes_times(2);
        let cache = NodeCache::new();
        let token = CancellationToken::new();

        let count = cache
            .initialize_with_retry(&api, Duration::from_millis(1), &token)
            .await;

        assert_eq!(count, Some(1));
        assert!(cache.is_initialized());
        assert_eq!(api.calls(), vec![Call::ListNodes; 3]);
    }

    #[tokio::test]
    async fn initialize_retry_stops_on_cancellation() {
        let api = FakeCluster::new().failing_list_nodes();
        let cache = NodeCache::new();
        let token = CancellationToken::new();
        token.cancel();

        let count = cache
            .initialize_with_retry(&api, Duration::from_secs(60), &token)
            .await;

        assert_eq!(count, None);
        assert!(!cache.is_initialized());
        assert_eq!(api.calls(), vec![Call::ListNodes]);
    }
}
