//! Tracks node readiness and finds MySQL operator pods whose host node has
//! gone not-ready, so they can be evicted and rescheduled.

use constcat::concat;

pub use cache::NodeCache;
pub use detector::{DriftDecision, DriftDetector};
pub use error::DriftError;
pub use mysql_drift_kubeapi::{ClusterApi, KubeApi, KubeApiError, NodeEvent};
pub use remove::Removal;
pub use watch::{NodeWatch, RestartPolicy};

mod cache;
mod detector;
mod error;
mod remove;
mod watch;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Selects every pod managed by the MySQL operator.
pub const MANAGED_BY_SELECTOR: &str = "app.kubernetes.io/managed-by=mysql.presslabs.org";

/// Selects the managed pod currently labeled as replication master.
pub const MASTER_SELECTOR: &str = concat!(MANAGED_BY_SELECTOR, ",role=master");

/// Selects the pods of the MySQL operator deployment itself.
pub const OPERATOR_SELECTOR: &str = "app=mysql-operator,release=mysql-operator";

pub const ROLE_LABEL: &str = "role";
pub const MASTER_ROLE: &str = "master";
