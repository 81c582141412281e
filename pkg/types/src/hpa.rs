use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::NamespacedName;

// --- Scale target ---

/// Reference to the workload being scaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossVersionObjectReference {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub api_version: String,
}

// --- HPA spec ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HPASpec {
    pub scale_target_ref: CrossVersionObjectReference,
    /// Lower replica bound; unset means the orchestrator default.
    #[serde(default)]
    pub min_replicas: Option<u32>,
    pub max_replicas: u32,
    /// Target average CPU utilization (percentage, e.g. 80 = 80%)
    #[serde(default)]
    pub target_cpu_utilization_percent: Option<u32>,
}

// --- HPA ---

/// Source resource: an autoscaling policy bound to a workload.
/// Read-only from the controller's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizontalPodAutoscaler {
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub spec: HPASpec,
    pub created_at: DateTime<Utc>,
}

impl HorizontalPodAutoscaler {
    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(&self.namespace, &self.name)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}
