use super::*;

/// Condition type reported by the kubelet for overall node health.
pub const NODE_READY: &str = "Ready";

/// Condition status meaning the condition holds.
pub const CONDITION_TRUE: &str = "True";

pub trait NodeExt {
    /// Build a node carrying a single `Ready` condition with the given status.
    fn with_ready_status(name: impl ToString, status: impl ToString) -> Self;

    fn conditions(&self) -> &[corev1::NodeCondition];

    /// `true` iff some condition has type `Ready` and status `True`.
    ///
    /// A missing `Ready` condition, or one reporting `False` / `Unknown`,
    /// counts as not ready. Other condition types never affect the result.
    ///
    fn is_ready(&self) -> bool {
        self.conditions()
            .iter()
            .any(|condition| condition.type_ == NODE_READY && condition.status == CONDITION_TRUE)
    }
}

impl NodeExt for corev1::Node {
    fn with_ready_status(name: impl ToString, status: impl ToString) -> Self {
        let condition = corev1::NodeCondition {
            type_: NODE_READY.to_string(),
            status: status.to_string(),
            ..default()
        };
        let status = corev1::NodeStatus {
            conditions: Some(vec![condition]),
            ..default()
        };
        Self {
            metadata: ObjectMetaExt::new(name),
            status: Some(status),
            ..default()
        }
    }

    fn conditions(&self) -> &[corev1::NodeCondition] {
        self.status
            .as_ref()
            .and_then(|status| status.conditions.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: &str, status: &str) -> corev1::NodeCondition {
        corev1::NodeCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            ..default()
        }
    }

    fn node(conditions: Vec<corev1::NodeCondition>) -> corev1::Node {
        corev1::Node {
            metadata: ObjectMetaExt::new("node-a"),
            status: Some(corev1::NodeStatus {
                conditions: Some(conditions),
                ..default()
            }),
            ..default()
        }
    }

    #[test]
    fn ready_true_is_ready() {
        assert!(corev1::Node::with_ready_status("node-a", "True").is_ready());
    }

    #[test]
    fn ready_false_and_unknown_are_not_ready() {
        assert!(!corev1::Node::with_ready_status("node-a", "False").is_ready());
        assert!(!corev1::Node::with_ready_status("node-a", "Unknown").is_ready());
    }

    #[test]
    fn empty_conditions_are_not_ready() {
        assert!(!node(vec![]).is_ready());
    }

    #[test]
    fn missing_status_is_not_ready() {
        let node = corev1::Node {
            metadata: ObjectMetaExt::new("node-a"),
            ..default()
        };
        assert!(node.conditions().is_empty());
        assert!(!node.is_ready());
    }

    #[test]
    fn other_condition_types_are_ignored() {
        let pressured = node(vec![
            condition("MemoryPressure", "True"),
            condition("DiskPressure", "True"),
        ]);
        assert!(!pressured.is_ready());

        let healthy = node(vec![
            condition("MemoryPressure", "True"),
            condition(NODE_READY, CONDITION_TRUE),
            condition("NetworkUnavailable", "True"),
        ]);
        assert!(healthy.is_ready());
    }

    #[test]
    fn condition_order_does_not_matter() {
        let first = node(vec![
            condition(NODE_READY, CONDITION_TRUE),
            condition("PIDPressure", "False"),
        ]);
        let last = node(vec![
            condition("PIDPressure", "False"),
            condition(NODE_READY, CONDITION_TRUE),
        ]);
        assert!(first.is_ready());
        assert!(last.is_ready());
    }

    #[test]
    fn status_comparison_is_exact() {
        assert!(!corev1::Node::with_ready_status("node-a", "true").is_ready());
        assert!(!node(vec![condition("ready", CONDITION_TRUE)]).is_ready());
    }
}
