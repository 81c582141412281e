use async_trait::async_trait;
use chrono::Utc;
use pkg_constants::state::{HPA_PREFIX, SCALED_OBJECT_PREFIX};
use pkg_state::client::StateStore;
use pkg_types::hpa::HorizontalPodAutoscaler;
use pkg_types::meta::NamespacedName;
use pkg_types::scaledobject::ScaledObject;
use uuid::Uuid;

/// Failure of a create call. `AlreadyExists` is the lost side of a create race.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        kind: &'static str,
        key: NamespacedName,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Typed access to the resources the transfer controller touches.
/// Reads return `Ok(None)` for absent objects; only real failures are errors.
#[async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    async fn get_hpa(
        &self,
        key: &NamespacedName,
    ) -> anyhow::Result<Option<HorizontalPodAutoscaler>>;

    async fn get_scaled_object(
        &self,
        key: &NamespacedName,
    ) -> anyhow::Result<Option<ScaledObject>>;

    /// Create-if-absent. The returned object carries the server-assigned fields.
    async fn create_scaled_object(
        &self,
        object: ScaledObject,
    ) -> Result<ScaledObject, ClientError>;

    /// Identities of every stored HPA, for the startup resync.
    async fn list_hpas(&self) -> anyhow::Result<Vec<NamespacedName>>;
}

/// [`ResourceClient`] over the SlateDB-backed [`StateStore`].
#[derive(Clone)]
pub struct StoreClient {
    store: StateStore,
}

impl StoreClient {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        prefix: &str,
        key: &NamespacedName,
    ) -> anyhow::Result<Option<T>> {
        let registry_key = key.registry_key(prefix);
        match self.store.get(&registry_key).await? {
            Some(data) => {
                let value = serde_json::from_slice(&data)
                    .map_err(|e| anyhow::anyhow!("Failed to decode {}: {}", registry_key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResourceClient for StoreClient {
    async fn get_hpa(
        &self,
        key: &NamespacedName,
    ) -> anyhow::Result<Option<HorizontalPodAutoscaler>> {
        self.get_json(HPA_PREFIX, key).await
    }

    async fn get_scaled_object(
        &self,
        key: &NamespacedName,
    ) -> anyhow::Result<Option<ScaledObject>> {
        self.get_json(SCALED_OBJECT_PREFIX, key).await
    }

    async fn create_scaled_object(
        &self,
        mut object: ScaledObject,
    ) -> Result<ScaledObject, ClientError> {
        object.id = Uuid::new_v4().to_string();
        object.created_at = Some(Utc::now());

        let key = object.key();
        let data = serde_json::to_vec(&object).map_err(anyhow::Error::from)?;
        if !self
            .store
            .create(&key.registry_key(SCALED_OBJECT_PREFIX), &data)
            .await?
        {
            return Err(ClientError::AlreadyExists {
                kind: "ScaledObject",
                key,
            });
        }
        Ok(object)
    }

    async fn list_hpas(&self) -> anyhow::Result<Vec<NamespacedName>> {
        let entries = self.store.list_prefix(HPA_PREFIX).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, _)| NamespacedName::from_registry_key(HPA_PREFIX, &key))
            .collect())
    }
}

/// In-memory [`ResourceClient`] with failure injection, shared by the controller tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    pub(crate) struct FakeClient {
        pub hpas: Mutex<HashMap<NamespacedName, HorizontalPodAutoscaler>>,
        pub scaled_objects: Mutex<HashMap<NamespacedName, ScaledObject>>,
        pub hpa_gets: AtomicUsize,
        pub lists: AtomicUsize,
        /// Number of upcoming `list_hpas` calls that fail.
        pub failing_lists: AtomicUsize,
        pub creates: AtomicUsize,
        /// Number of upcoming `get_hpa` calls that fail.
        pub failing_hpa_gets: AtomicUsize,
        pub fail_scaled_object_get: AtomicBool,
        pub fail_create: AtomicBool,
        /// Another writer creates the object between lookup and create.
        pub race_on_create: AtomicBool,
        /// Delay applied to every call.
        pub latency: Mutex<Option<Duration>>,
    }

    impl FakeClient {
        pub fn insert_hpa(&self, hpa: HorizontalPodAutoscaler) {
            self.hpas.lock().unwrap().insert(hpa.key(), hpa);
        }

        pub fn scaled_object(&self, key: &NamespacedName) -> Option<ScaledObject> {
            self.scaled_objects.lock().unwrap().get(key).cloned()
        }

        pub fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        async fn simulate_latency(&self) {
            let latency = *self.latency.lock().unwrap();
            if let Some(d) = latency {
                tokio::time::sleep(d).await;
            }
        }
    }

    #[async_trait]
    impl ResourceClient for FakeClient {
        async fn get_hpa(
            &self,
            key: &NamespacedName,
        ) -> anyhow::Result<Option<HorizontalPodAutoscaler>> {
            self.simulate_latency().await;
            self.hpa_gets.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failing_hpa_gets
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                anyhow::bail!("connection refused");
            }
            Ok(self.hpas.lock().unwrap().get(key).cloned())
        }

        async fn get_scaled_object(
            &self,
            key: &NamespacedName,
        ) -> anyhow::Result<Option<ScaledObject>> {
            self.simulate_latency().await;
            if self.fail_scaled_object_get.load(Ordering::SeqCst) {
                anyhow::bail!("forbidden");
            }
            Ok(self.scaled_object(key))
        }

        async fn create_scaled_object(
            &self,
            mut object: ScaledObject,
        ) -> Result<ScaledObject, ClientError> {
            self.simulate_latency().await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("too many requests").into());
            }
            let key = object.key();
            let mut objects = self.scaled_objects.lock().unwrap();
            if self.race_on_create.load(Ordering::SeqCst) {
                objects.insert(key.clone(), object.clone());
            }
            if objects.contains_key(&key) {
                return Err(ClientError::AlreadyExists {
                    kind: "ScaledObject",
                    key,
                });
            }
            object.id = format!("uid-{}", key.name);
            objects.insert(key, object.clone());
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(object)
        }

        async fn list_hpas(&self) -> anyhow::Result<Vec<NamespacedName>> {
            let failing = self
                .failing_lists
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            self.lists.fetch_add(1, Ordering::SeqCst);
            if failing {
                anyhow::bail!("scan interrupted");
            }
            Ok(self.hpas.lock().unwrap().keys().cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::hpa::{CrossVersionObjectReference, HPASpec};
    use pkg_types::scaledobject::{ScaleTarget, ScaledObjectSpec};
    use std::collections::HashMap;

    async fn temp_client() -> StoreClient {
        let dir = std::env::temp_dir().join(format!("hpa-transfer-client-{}", Uuid::new_v4()));
        StoreClient::new(StateStore::new(dir.to_str().unwrap()).await.unwrap())
    }

    fn scaled_object(ns: &str, name: &str) -> ScaledObject {
        ScaledObject {
            id: String::new(),
            name: name.to_string(),
            namespace: ns.to_string(),
            annotations: HashMap::new(),
            owner_references: Vec::new(),
            spec: ScaledObjectSpec {
                scale_target_ref: ScaleTarget {
                    name: "web".to_string(),
                    api_version: "apps/v1".to_string(),
                    kind: "Deployment".to_string(),
                },
                min_replica_count: Some(1),
                max_replica_count: Some(3),
                advanced: None,
                triggers: Vec::new(),
            },
            created_at: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_uid_and_rejects_duplicates() {
        let client = temp_client().await;
        let created = client
            .create_scaled_object(scaled_object("prod", "web-scaledobject"))
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert!(created.created_at.is_some());

        let fetched = client
            .get_scaled_object(&NamespacedName::new("prod", "web-scaledobject"))
            .await
            .unwrap();
        assert_eq!(fetched, Some(created));

        let err = client
            .create_scaled_object(scaled_object("prod", "web-scaledobject"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn missing_objects_read_as_none() {
        let client = temp_client().await;
        let key = NamespacedName::new("prod", "nope");
        assert!(client.get_hpa(&key).await.unwrap().is_none());
        assert!(client.get_scaled_object(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_and_decodes_stored_hpas() {
        let client = temp_client().await;
        let hpa = HorizontalPodAutoscaler {
            id: "uid-1".to_string(),
            name: "web".to_string(),
            namespace: "prod".to_string(),
            annotations: HashMap::new(),
            spec: HPASpec {
                scale_target_ref: CrossVersionObjectReference {
                    kind: "Deployment".to_string(),
                    name: "web".to_string(),
                    api_version: "apps/v1".to_string(),
                },
                min_replicas: None,
                max_replicas: 5,
                target_cpu_utilization_percent: Some(80),
            },
            created_at: Utc::now(),
        };
        let key = hpa.key();
        client
            .store
            .put(&key.registry_key(HPA_PREFIX), &serde_json::to_vec(&hpa).unwrap())
            .await
            .unwrap();

        assert_eq!(client.list_hpas().await.unwrap(), vec![key.clone()]);
        let fetched = client.get_hpa(&key).await.unwrap().unwrap();
        assert_eq!(fetched.spec, hpa.spec);
    }

    #[tokio::test]
    async fn corrupt_records_are_errors() {
        let client = temp_client().await;
        let key = NamespacedName::new("prod", "broken");
        client
            .store
            .put(&key.registry_key(HPA_PREFIX), b"not json")
            .await
            .unwrap();
        assert!(client.get_hpa(&key).await.is_err());
    }
}
