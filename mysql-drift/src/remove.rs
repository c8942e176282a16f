use kube::ResourceExt as _;
use mysql_drift_ext as k8s;
use mysql_drift_kubeapi::ClusterApi;

use k8s::PodExt as _;
use k8s::corev1;

use crate::{DriftDetector, DriftError};

/// Outcome of both steps of a pod removal.
#[derive(Debug)]
pub struct Removal {
    pub eviction: Result<(), DriftError>,
    pub deletion: Result<(), DriftError>,
}

impl Removal {
    /// The forced deletion went through, whatever happened to the eviction.
    pub fn is_deleted(&self) -> bool {
        self.deletion.is_ok()
    }
}

impl<A: ClusterApi> DriftDetector<A> {
    /// Evict and then force-delete `pod`, logging any failure.
    ///
    /// Best effort: nothing is reported back to the caller.
    ///
    pub async fn remove(&self, pod: &corev1::Pod) {
        let name = pod.name_any();
        let namespace = pod.namespace_or_default();
        let removal = self.try_remove(pod).await;

        if let Err(err) = &removal.eviction {
            tracing::error!(namespace, name, ?err, "Failed to evict pod");
        }
        match &removal.deletion {
            Ok(()) => tracing::info!(namespace, name, "Pod deleted"),
            Err(err) => tracing::error!(namespace, name, ?err, "Failed to delete pod"),
        }
    }

    /// Issue the eviction, then the deletion regardless of the eviction result.
    pub async fn try_remove(&self, pod: &corev1::Pod) -> Removal {
        let name = pod.name_any();
        let namespace = pod.namespace_or_default();

        let eviction = self
            .api()
            .evict_pod(namespace, &name)
            .await
            .map_err(|err| DriftError::query("evict pod", err));
        let deletion = self
            .api()
            .delete_pod(namespace, &name)
            .await
            .map_err(|err| DriftError::query("delete pod", err));

        Removal { eviction, deletion }
    }
}
