use std::error::Error;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    /// A list, evict or delete call against the cluster failed.
    #[error("cluster query `{operation}` failed")]
    ClusterQuery {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The node watch stream returned an error.
    #[error("node watch stream failed")]
    WatchStream {
        #[source]
        source: BoxError,
    },
}

impl DriftError {
    pub(crate) fn query(operation: &'static str, err: impl Error + Send + Sync + 'static) -> Self {
        Self::ClusterQuery {
            operation,
            source: Box::new(err),
        }
    }

    pub(crate) fn watch(err: impl Error + Send + Sync + 'static) -> Self {
        Self::WatchStream {
            source: Box::new(err),
        }
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::ClusterQuery { operation, .. } => Some(*operation),
            Self::WatchStream { .. } => None,
        }
    }
}
