use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a namespaced resource. This is the only input a reconcile receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Store key for this resource under `prefix` (e.g. `/registry/hpa/`).
    pub fn registry_key(&self, prefix: &str) -> String {
        format!("{}{}/{}", prefix, self.namespace, self.name)
    }

    /// Recover the resource identity from a store key.
    /// Returns `None` if the key is outside `prefix` or is not `<ns>/<name>`.
    pub fn from_registry_key(prefix: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(prefix)?;
        let (namespace, name) = rest.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Declared dependency of one object on another.
/// The orchestrator deletes the dependent when its owner goes away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    /// At most one owner reference per object may be the controller.
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}
