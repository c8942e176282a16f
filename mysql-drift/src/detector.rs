use std::sync::Arc;

use kube::ResourceExt as _;
use mysql_drift_ext as k8s;
use mysql_drift_kubeapi::ClusterApi;
use serde::Serialize;

use k8s::NodeExt as _;
use k8s::PodExt as _;
use k8s::corev1;

use crate::{
    DriftError, MANAGED_BY_SELECTOR, MASTER_ROLE, MASTER_SELECTOR, NodeCache, OPERATOR_SELECTOR,
    ROLE_LABEL,
};

/// Result of a drift query: whether a matching pod was found, and which one.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DriftDecision {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<corev1::Pod>,
}

impl DriftDecision {
    pub fn found(pod: corev1::Pod) -> Self {
        Self {
            found: true,
            pod: Some(pod),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn into_pod(self) -> Option<corev1::Pod> {
        self.pod
    }
}

impl From<Option<corev1::Pod>> for DriftDecision {
    fn from(pod: Option<corev1::Pod>) -> Self {
        pod.map_or_else(Self::not_found, Self::found)
    }
}

/// Answers drift queries by cross-referencing listed pods with a [`NodeCache`].
///
/// Each query comes in two forms. The `try_` form reports listing failures as
/// [`DriftError`]. The plain form logs the failure and reports "not found",
/// which callers cannot tell apart from a healthy cluster.
///
#[derive(Debug)]
pub struct DriftDetector<A> {
    api: Arc<A>,
    cache: Arc<NodeCache>,
}

impl<A: ClusterApi> DriftDetector<A> {
    pub fn new(api: Arc<A>, cache: Arc<NodeCache>) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    /// First MySQL pod whose host node is cached and not ready.
    ///
    /// Pods on nodes the cache has never seen are not reported. `ip` only
    /// labels the query in logs; every managed pod is considered.
    ///
    pub async fn server_drift(&self, ip: &str) -> DriftDecision {
        self.try_server_drift(ip).await.unwrap_or_else(|err| {
            tracing::error!(ip, ?err, "Failed to check MySQL pods for drift");
            DriftDecision::not_found()
        })
    }

    pub async fn try_server_drift(&self, ip: &str) -> Result<DriftDecision, DriftError> {
        tracing::debug!(ip, "Checking MySQL pods for drift");
        let pods = self.list_pods(MANAGED_BY_SELECTOR).await?;
        Ok(self.first_on_unready_node(pods).await)
    }

    /// First pod labeled as MySQL master. Node readiness is not consulted.
    pub async fn master_pod(&self) -> DriftDecision {
        self.try_master_pod().await.unwrap_or_else(|err| {
            tracing::error!(?err, "Failed to look up MySQL master pod");
            DriftDecision::not_found()
        })
    }

    pub async fn try_master_pod(&self) -> Result<DriftDecision, DriftError> {
        let pods = self.list_pods(MASTER_SELECTOR).await?;
        let master = pods
            .into_iter()
            .find(|pod| pod.has_label(ROLE_LABEL, MASTER_ROLE));
        Ok(master.into())
    }

    /// First MySQL operator pod whose host node is cached and not ready.
    pub async fn operator_drift(&self) -> DriftDecision {
        self.try_operator_drift().await.unwrap_or_else(|err| {
            tracing::error!(?err, "Failed to check operator pods for drift");
            DriftDecision::not_found()
        })
    }

    pub async fn try_operator_drift(&self) -> Result<DriftDecision, DriftError> {
        let pods = self.list_pods(OPERATOR_SELECTOR).await?;
        Ok(self.first_on_unready_node(pods).await)
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<corev1::Pod>, DriftError> {
        self.api
            .list_pods(selector)
            .await
            .map_err(|err| DriftError::query("list pods", err))
    }

    async fn first_on_unready_node(&self, pods: Vec<corev1::Pod>) -> DriftDecision {
        for pod in pods {
            let Some(node) = pod.node_name() else {
                continue;
            };
            let drifted = self
                .cache
                .lookup(node)
                .await
                .is_some_and(|node| !node.is_ready());
            if drifted {
                tracing::info!(pod = pod.name_any(), node, "Pod is on a not-ready node");
                return DriftDecision::found(pod);
            }
        }
        DriftDecision::not_found()
    }
}
