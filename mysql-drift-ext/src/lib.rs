pub use k8s_openapi as openapi;
pub use k8s_openapi::api::core::v1 as corev1;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

pub use node::{CONDITION_TRUE, NODE_READY, NodeExt};
pub use pod::PodExt;

mod node;
mod pod;

/// Namespace assumed for pods whose metadata does not carry one.
pub const DEFAULT_NAMESPACE: &str = "default";

pub trait ObjectMetaExt {
    fn new(name: impl ToString) -> Self;
    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self;
    fn label(self, key: impl ToString, value: impl ToString) -> Self;
}

impl ObjectMetaExt for metav1::ObjectMeta {
    fn new(name: impl ToString) -> Self {
        let name = Some(name.to_string());
        Self { name, ..default() }
    }

    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::new(name)
        }
    }

    fn label(self, key: impl ToString, value: impl ToString) -> Self {
        let mut labels = self.labels.unwrap_or_default();
        labels.insert(key.to_string(), value.to_string());
        Self {
            labels: Some(labels),
            ..self
        }
    }
}

pub trait StatusExt {
    fn not_found<K>(name: impl ToString) -> Self
    where
        K: openapi::Resource;
}

impl StatusExt for metav1::Status {
    /// A `NotFound` failure status for the object `name` of kind `K`.
    fn not_found<K>(name: impl ToString) -> Self
    where
        K: openapi::Resource,
    {
        let kind = K::URL_PATH_SEGMENT.to_string();
        let name = name.to_string();
        let message = format!(r#"{kind} "{name}" not found"#);
        let details = metav1::StatusDetails {
            name: Some(name),
            kind: Some(kind),
            ..default()
        };
        Self {
            code: Some(404),
            details: Some(details),
            message: Some(message),
            reason: Some("NotFound".to_string()),
            status: Some("Failure".to_string()),
            ..default()
        }
    }
}

pub fn default<T: Default>() -> T {
    T::default()
}
