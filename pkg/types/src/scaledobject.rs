use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::{NamespacedName, OwnerReference};

// --- Scale target ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTarget {
    pub name: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

// --- Advanced config ---

/// Names the HPA this ScaledObject supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalPodAutoscalerConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default)]
    pub horizontal_pod_autoscaler_config: Option<HorizontalPodAutoscalerConfig>,
}

// --- Triggers ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

// --- ScaledObject spec ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledObjectSpec {
    pub scale_target_ref: ScaleTarget,
    #[serde(default)]
    pub min_replica_count: Option<u32>,
    #[serde(default)]
    pub max_replica_count: Option<u32>,
    #[serde(default)]
    pub advanced: Option<AdvancedConfig>,
    #[serde(default)]
    pub triggers: Vec<ScaleTrigger>,
}

// --- ScaledObject ---

/// Target resource consumed by the external autoscaling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledObject {
    /// Assigned by the store on create; empty for desired state.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    pub spec: ScaledObjectSpec,
    /// Assigned by the store on create.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ScaledObject {
    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(&self.namespace, &self.name)
    }

    /// The owner reference marked as controller, if any.
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}
