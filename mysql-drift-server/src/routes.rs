use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mysql_drift::{ClusterApi, DriftDecision, DriftDetector};
use mysql_drift_ext as k8s;
use serde::{Deserialize, Serialize};

use k8s::NodeExt as _;
use k8s::StatusExt as _;
use k8s::corev1;
use k8s::metav1;

type AppState<A> = State<Arc<DriftDetector<A>>>;

pub(crate) fn router<A: ClusterApi>(detector: Arc<DriftDetector<A>>) -> Router {
    let queries = Router::new()
        .route("/readyz", get(readyz::<A>))
        .route("/drift", get(server_drift::<A>))
        .route("/drift/operator", get(operator_drift::<A>))
        .route("/master", get(master_pod::<A>))
        .route("/nodes/{node}", get(node::<A>))
        .with_state(detector);

    Router::new().route("/healthz", get(healthz)).merge(queries)
}

#[derive(Debug, Default, Deserialize)]
struct DriftQuery {
    #[serde(default)]
    ip: String,
}

#[derive(Debug, Serialize)]
struct NodeReadiness {
    name: String,
    ready: bool,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz<A: ClusterApi>(State(detector): AppState<A>) -> (http::StatusCode, &'static str) {
    let cache = detector.cache();
    if !cache.is_initialized() {
        (
            http::StatusCode::SERVICE_UNAVAILABLE,
            "node cache not initialized",
        )
    } else if cache.is_watch_stopped() {
        (http::StatusCode::SERVICE_UNAVAILABLE, "node watch stopped")
    } else {
        (http::StatusCode::OK, "ok")
    }
}

async fn server_drift<A: ClusterApi>(
    Query(query): Query<DriftQuery>,
    State(detector): AppState<A>,
) -> Json<DriftDecision> {
    Json(detector.server_drift(&query.ip).await)
}

async fn operator_drift<A: ClusterApi>(State(detector): AppState<A>) -> Json<DriftDecision> {
    Json(detector.operator_drift().await)
}

async fn master_pod<A: ClusterApi>(State(detector): AppState<A>) -> Json<DriftDecision> {
    Json(detector.master_pod().await)
}

async fn node<A: ClusterApi>(
    Path(node): Path<String>,
    State(detector): AppState<A>,
) -> Result<Json<NodeReadiness>, NotFound<corev1::Node>> {
    let record = detector.cache().lookup(&node).await;
    match record {
        Some(record) => Ok(Json(NodeReadiness {
            ready: record.is_ready(),
            name: node,
        })),
        None => Err(NotFound::new(node)),
    }
}

struct NotFound<K> {
    name: String,
    resource: PhantomData<K>,
}

impl<K> NotFound<K> {
    fn new(name: String) -> Self {
        Self {
            name,
            resource: PhantomData,
        }
    }
}

impl<K> IntoResponse for NotFound<K>
where
    K: k8s::openapi::Resource,
{
    fn into_response(self) -> Response {
        let status = metav1::Status::not_found::<K>(self.name);
        (http::StatusCode::NOT_FOUND, Json(status)).into_response()
    }
}
