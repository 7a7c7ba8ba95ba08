use serde::{Deserialize, Serialize};

use super::metadata::ObjectKey;

/// The cluster an operation targets, as resolved from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCluster {
    pub key: ObjectKey,
    /// Base URL of the optimization engine serving this cluster
    #[serde(default)]
    pub engine_endpoint: Option<String>,
}

impl TargetCluster {
    pub fn new(key: ObjectKey) -> Self {
        Self {
            key,
            engine_endpoint: None,
        }
    }

    pub fn with_engine_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.engine_endpoint = Some(endpoint.into());
        self
    }
}
