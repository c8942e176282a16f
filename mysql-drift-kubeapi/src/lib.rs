use std::fmt::Debug;

use futures::StreamExt as _;
use futures::stream::BoxStream;
use kube::api;
use kube::runtime::watcher;
use mysql_drift_ext as k8s;

use k8s::corev1;

/// One change delivered by the node watch.
///
/// `Applied` carries the full replacement object for a node that was added or
/// modified (including nodes re-delivered after the watch re-lists).
///
/// A re-list is bracketed by `Relisting` and `Relisted`. Nodes removed while
/// the watch was desynced produce no `Deleted`; they are simply absent from
/// the `Applied` events between the two markers.
///
#[derive(Clone, Debug, PartialEq)]
pub enum NodeEvent {
    Applied(corev1::Node),
    Deleted(corev1::Node),
    Relisting,
    Relisted,
}

/// The subset of the cluster control plane the drift detector consumes.
///
/// Implemented by [`KubeApi`] against a live API server, and by in-memory
/// fakes in tests.
///
pub trait ClusterApi: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// List every node in the cluster.
    fn list_nodes(&self) -> impl Future<Output = Result<Vec<corev1::Node>, Self::Error>> + Send;

    /// Open a long-lived watch over all nodes.
    fn watch_nodes(&self) -> BoxStream<'static, Result<NodeEvent, Self::Error>>;

    /// List pods across all namespaces matching `selector`.
    fn list_pods(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<corev1::Pod>, Self::Error>> + Send;

    /// Request eviction of a pod with zero grace period and foreground propagation.
    fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete a pod with zero grace period.
    fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum KubeApiError {
    #[error("kubernetes api request failed")]
    Request(#[from] kube::Error),
    #[error("node watch failed")]
    Watch(#[from] watcher::Error),
}

pub struct KubeApi {
    list_params: api::ListParams,
    evict_params: api::EvictParams,
    delete_params: api::DeleteParams,
    client: kube::Client,
}

impl KubeApi {
    /// Create a KubeApi configured with a default Kubernetes client.
    ///
    /// The client configuration is inferred from the local kubeconfig or the
    /// in-cluster service account.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), kube::Error> {
    /// let api = mysql_drift_kubeapi::KubeApi::new().await?;
    /// // use `api`...
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new() -> kube::Result<Self> {
        kube::Client::try_default().await.map(Self::with_client)
    }

    /// Create a KubeApi backed by the provided Kubernetes client.
    ///
    /// Evictions are issued with a zero grace period and foreground
    /// propagation; deletions with a zero grace period.
    ///
    pub fn with_client(client: kube::Client) -> Self {
        let evict_params = api::EvictParams {
            delete_options: Some(api::DeleteParams {
                grace_period_seconds: Some(0),
                propagation_policy: Some(api::PropagationPolicy::Foreground),
                ..k8s::default()
            }),
            ..k8s::default()
        };
        let delete_params = api::DeleteParams {
            grace_period_seconds: Some(0),
            ..k8s::default()
        };
        Self {
            list_params: api::ListParams::default(),
            evict_params,
            delete_params,
            client,
        }
    }

    /// Returns an Api handle scoped to all Nodes.
    fn nodes(&self) -> api::Api<corev1::Node> {
        api::Api::all(self.client.clone())
    }

    /// Returns an Api handle scoped to Pods in every namespace.
    fn pods(&self) -> api::Api<corev1::Pod> {
        api::Api::all(self.client.clone())
    }

    fn namespaced_pods(&self, namespace: &str) -> api::Api<corev1::Pod> {
        api::Api::namespaced(self.client.clone(), namespace)
    }

    fn list_params(&self) -> &api::ListParams {
        &self.list_params
    }

    /// Parameters used by [`ClusterApi::evict_pod`].
    pub fn evict_params(&self) -> &api::EvictParams {
        &self.evict_params
    }

    /// Parameters used by [`ClusterApi::delete_pod`].
    pub fn delete_params(&self) -> &api::DeleteParams {
        &self.delete_params
    }
}

impl ClusterApi for KubeApi {
    type Error = KubeApiError;

    async fn list_nodes(&self) -> Result<Vec<corev1::Node>, Self::Error> {
        let lp = self.list_params();
        let list = self.nodes().list(lp).await?;
        Ok(list.items)
    }

    fn watch_nodes(&self) -> BoxStream<'static, Result<NodeEvent, Self::Error>> {
        watcher(self.nodes(), watcher::Config::default())
            .map(node_event)
            .boxed()
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<corev1::Pod>, Self::Error> {
        tracing::debug!(selector, "Listing pods");
        let lp = self.list_params().clone().labels(selector);
        let list = self.pods().list(&lp).await?;
        Ok(list.items)
    }

    async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), Self::Error> {
        let ep = self.evict_params();
        self.namespaced_pods(namespace).evict(name, ep).await?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Self::Error> {
        let dp = self.delete_params();
        self.namespaced_pods(namespace).delete(name, dp).await?;
        Ok(())
    }
}

/// Translate a raw watcher event into a [`NodeEvent`].
fn node_event(
    event: Result<watcher::Event<corev1::Node>, watcher::Error>,
) -> Result<NodeEvent, KubeApiError> {
    let event = match event? {
        watcher::Event::Apply(node) | watcher::Event::InitApply(node) => NodeEvent::Applied(node),
        watcher::Event::Delete(node) => NodeEvent::Deleted(node),
        watcher::Event::Init => NodeEvent::Relisting,
        watcher::Event::InitDone => NodeEvent::Relisted,
    };
    Ok(event)
}

impl Debug for KubeApi {
    /// Formats the `KubeApi` for debugging, redacting the `client`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApi")
            .field("list_params", &self.list_params)
            .field("evict_options", &self.evict_params.delete_options)
            .field("delete_params", &self.delete_params)
            .field("client", &"<kube::Client>")
            .finish()
    }
}
