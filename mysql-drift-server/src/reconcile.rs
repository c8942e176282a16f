use std::sync::Arc;
use std::time::Duration;

use kube::ResourceExt as _;
use mysql_drift::{ClusterApi, DriftDetector};
use mysql_drift_ext::PodExt as _;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Label for the managed-pod query when no particular server is targeted.
const ANY_SERVER: &str = "*";

pub(crate) async fn run<A: ClusterApi>(
    detector: Arc<DriftDetector<A>>,
    period: Duration,
    evict: bool,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let drifted = reconcile(&detector, evict).await;
        tracing::debug!(drifted, "Reconcile pass finished");
    }
    tracing::info!("Reconcile loop stopped");
}

/// Run every drift query once, removing what they find when `evict` is set.
///
/// Returns the number of drifted pods found.
///
pub(crate) async fn reconcile<A: ClusterApi>(detector: &DriftDetector<A>, evict: bool) -> usize {
    let decisions = [
        ("mysql", detector.server_drift(ANY_SERVER).await),
        ("operator", detector.operator_drift().await),
    ];

    let mut drifted = 0;
    for (kind, decision) in decisions {
        let Some(pod) = decision.into_pod() else {
            continue;
        };
        drifted += 1;
        tracing::warn!(
            kind,
            pod = pod.name_any(),
            node = pod.node_name(),
            "Pod is on a not-ready node"
        );
        if evict {
            detector.remove(&pod).await;
        }
    }
    drifted
}
