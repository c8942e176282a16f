use super::*;

pub trait PodExt {
    /// Build a pod in `namespace` scheduled onto `node`.
    fn scheduled(name: impl ToString, namespace: impl ToString, node: impl ToString) -> Self;

    fn label(self, key: impl ToString, value: impl ToString) -> Self;

    /// Name of the node hosting this pod, if it has been scheduled.
    fn node_name(&self) -> Option<&str>;

    fn namespace_or_default(&self) -> &str;

    fn has_label(&self, key: &str, value: &str) -> bool;
}

impl PodExt for corev1::Pod {
    fn scheduled(name: impl ToString, namespace: impl ToString, node: impl ToString) -> Self {
        let spec = corev1::PodSpec {
            node_name: Some(node.to_string()),
            ..default()
        };
        Self {
            metadata: metav1::ObjectMeta::with_namespace(name, namespace),
            spec: Some(spec),
            ..default()
        }
    }

    fn label(self, key: impl ToString, value: impl ToString) -> Self {
        Self {
            metadata: self.metadata.label(key, value),
            ..self
        }
    }

    fn node_name(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.node_name.as_deref())
    }

    fn namespace_or_default(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    fn has_label(&self, key: &str, value: &str) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .is_some_and(|label| label == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_pod() {
        let pod = corev1::Pod::scheduled("mysql-0", "databases", "node-a");

        assert_eq!(pod.metadata.name.as_deref(), Some("mysql-0"));
        assert_eq!(pod.namespace_or_default(), "databases");
        assert_eq!(pod.node_name(), Some("node-a"));
    }

    #[test]
    fn unscheduled_pod_has_no_node() {
        let pod = corev1::Pod {
            metadata: ObjectMetaExt::new("pending"),
            ..default()
        };

        assert_eq!(pod.node_name(), None);
        assert_eq!(pod.namespace_or_default(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn label_equality() {
        let pod = corev1::Pod::scheduled("mysql-0", "databases", "node-a").label("role", "master");

        assert!(pod.has_label("role", "master"));
        assert!(!pod.has_label("role", "replica"));
        assert!(!pod.has_label("app", "master"));
    }

    #[test]
    fn unlabeled_pod_has_no_labels() {
        let pod = corev1::Pod::scheduled("mysql-0", "databases", "node-a");
        assert!(!pod.has_label("role", "master"));
    }
}
