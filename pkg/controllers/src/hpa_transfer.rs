use pkg_constants::transfer::{
    ANNOTATION_TRUE, HPA_API_VERSION, HPA_KIND, HPA_OWNERSHIP_VALIDATION_ANNOTATION,
    MANAGED_BY_ANNOTATION, SCALED_OBJECT_SUFFIX, TRANSFER_ANNOTATION,
    TRANSFER_OWNERSHIP_ANNOTATION,
};
use pkg_types::hpa::HorizontalPodAutoscaler;
use pkg_types::meta::{NamespacedName, OwnerReference};
use pkg_types::scaledobject::{
    AdvancedConfig, HorizontalPodAutoscalerConfig, ScaleTarget, ScaledObject, ScaledObjectSpec,
};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::client::{ClientError, ResourceClient};

/// Why a reconcile left everything untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// The HPA is gone; the signal was stale or it was deleted.
    SourceNotFound,
    /// The HPA is not annotated for transfer.
    NotEligible,
}

/// Result of a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoOp(NoOpReason),
    /// A ScaledObject was created on this pass.
    Created,
    /// The ScaledObject was already there. Its fields are left as found.
    AlreadyExists,
}

impl Outcome {
    /// Only a fresh create asks to be run again, so the next pass observes the object.
    pub fn requeue(&self) -> bool {
        matches!(self, Outcome::Created)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store call failed: {0:#}")]
    Store(anyhow::Error),
    #[error("cannot set owner reference: {0}")]
    Ownership(String),
    #[error("reconcile cancelled")]
    Cancelled,
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Ambient cancellation and deadline for the store calls of one reconcile.
#[derive(Clone)]
pub struct ReconcileContext {
    shutdown: watch::Receiver<bool>,
    call_timeout: Duration,
}

impl ReconcileContext {
    pub fn new(shutdown: watch::Receiver<bool>, call_timeout: Duration) -> Self {
        Self {
            shutdown,
            call_timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Drive `call` until it completes, the deadline passes, or shutdown is signalled.
    pub async fn run<F: Future>(&self, call: F) -> Result<F::Output, ReconcileError> {
        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            res = tokio::time::timeout(self.call_timeout, call) => {
                res.map_err(|_| ReconcileError::Timeout(self.call_timeout))
            }
            _ = wait_for_shutdown(&mut shutdown) => Err(ReconcileError::Cancelled),
        }
    }
}

/// Resolves once the flag flips to `true`. A dropped sender never cancels.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let sender_alive = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !sender_alive {
        std::future::pending::<()>().await;
    }
}

/// Name of the ScaledObject derived from an HPA.
pub fn scaled_object_name(hpa_name: &str) -> String {
    format!("{}{}", hpa_name, SCALED_OBJECT_SUFFIX)
}

/// Whether the HPA opted into transfer.
///
/// Both checks are literal string comparisons: `transfer-hpa` must be exactly
/// `"true"`, and `app.kubernetes.io/managed-by` must not be `"true"`.
pub fn wants_transfer(hpa: &HorizontalPodAutoscaler) -> bool {
    hpa.annotation(TRANSFER_ANNOTATION) == Some(ANNOTATION_TRUE)
        && hpa.annotation(MANAGED_BY_ANNOTATION) != Some(ANNOTATION_TRUE)
}

/// The ScaledObject that should exist for `hpa`. Pure: no ids, no timestamps.
pub fn desired_scaled_object(hpa: &HorizontalPodAutoscaler) -> ScaledObject {
    let target = &hpa.spec.scale_target_ref;
    let annotations = HashMap::from([
        (
            TRANSFER_OWNERSHIP_ANNOTATION.to_string(),
            ANNOTATION_TRUE.to_string(),
        ),
        (
            HPA_OWNERSHIP_VALIDATION_ANNOTATION.to_string(),
            ANNOTATION_TRUE.to_string(),
        ),
    ]);

    ScaledObject {
        id: String::new(),
        name: scaled_object_name(&hpa.name),
        namespace: hpa.namespace.clone(),
        annotations,
        owner_references: Vec::new(),
        spec: ScaledObjectSpec {
            scale_target_ref: ScaleTarget {
                name: target.name.clone(),
                api_version: target.api_version.clone(),
                kind: target.kind.clone(),
            },
            min_replica_count: hpa.spec.min_replicas,
            max_replica_count: Some(hpa.spec.max_replicas),
            advanced: Some(AdvancedConfig {
                horizontal_pod_autoscaler_config: Some(HorizontalPodAutoscalerConfig {
                    name: hpa.name.clone(),
                }),
            }),
            // Filled in later by whoever configures the autoscaling engine.
            triggers: Vec::new(),
        },
        created_at: None,
    }
}

/// Make `owner` the controlling owner of `object`.
///
/// Fails without touching `object` if the owner has no uid, lives in another
/// namespace, or `object` is already controlled by someone else.
pub fn set_controller_reference(
    owner: &HorizontalPodAutoscaler,
    object: &mut ScaledObject,
) -> Result<(), ReconcileError> {
    if owner.id.is_empty() {
        return Err(ReconcileError::Ownership(format!(
            "owner {} has no uid",
            owner.key()
        )));
    }
    if owner.namespace != object.namespace {
        return Err(ReconcileError::Ownership(format!(
            "cross-namespace owner {} for {}",
            owner.key(),
            object.key()
        )));
    }
    if let Some(existing) = object.controller_ref()
        && existing.uid != owner.id
    {
        return Err(ReconcileError::Ownership(format!(
            "{} is already controlled by {} {}",
            object.key(),
            existing.kind,
            existing.name
        )));
    }

    let reference = OwnerReference {
        api_version: HPA_API_VERSION.to_string(),
        kind: HPA_KIND.to_string(),
        name: owner.name.clone(),
        uid: owner.id.clone(),
        controller: true,
        block_owner_deletion: true,
    };
    match object
        .owner_references
        .iter_mut()
        .find(|r| r.uid == reference.uid)
    {
        Some(r) => *r = reference,
        None => object.owner_references.push(reference),
    }
    Ok(())
}

/// Materializes a ScaledObject for every HPA annotated `transfer-hpa: "true"`.
///
/// Level-triggered: each call re-reads the HPA and derives the next step from
/// current state alone. The ScaledObject is created once and never updated.
pub struct HpaTransferReconciler<C> {
    client: C,
}

impl<C: ResourceClient> HpaTransferReconciler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        key: &NamespacedName,
    ) -> Result<Outcome, ReconcileError> {
        let hpa = match ctx.run(self.client.get_hpa(key)).await? {
            Ok(Some(hpa)) => hpa,
            Ok(None) => {
                info!(
                    namespace = %key.namespace,
                    name = %key.name,
                    "HPA not found, ignoring since it must have been deleted"
                );
                return Ok(Outcome::NoOp(NoOpReason::SourceNotFound));
            }
            Err(e) => {
                error!(
                    namespace = %key.namespace,
                    name = %key.name,
                    error = %format!("{:#}", e),
                    "Failed to get HPA"
                );
                return Err(ReconcileError::Store(e));
            }
        };

        if !wants_transfer(&hpa) {
            debug!(namespace = %key.namespace, name = %key.name, "HPA not marked for transfer");
            return Ok(Outcome::NoOp(NoOpReason::NotEligible));
        }

        let mut desired = desired_scaled_object(&hpa);
        set_controller_reference(&hpa, &mut desired)?;
        let target = desired.key();

        match ctx.run(self.client.get_scaled_object(&target)).await? {
            Ok(Some(found)) => {
                info!(
                    namespace = %found.namespace,
                    name = %found.name,
                    "ScaledObject already exists"
                );
                return Ok(Outcome::AlreadyExists);
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    namespace = %target.namespace,
                    name = %target.name,
                    error = %format!("{:#}", e),
                    "Failed to get ScaledObject"
                );
                return Err(ReconcileError::Store(e));
            }
        }

        info!(namespace = %target.namespace, name = %target.name, "Creating a new ScaledObject");
        match ctx.run(self.client.create_scaled_object(desired)).await? {
            Ok(created) => {
                info!(
                    namespace = %created.namespace,
                    name = %created.name,
                    uid = %created.id,
                    owner = %hpa.name,
                    "Created ScaledObject"
                );
                Ok(Outcome::Created)
            }
            Err(ClientError::AlreadyExists { .. }) => {
                info!(
                    namespace = %target.namespace,
                    name = %target.name,
                    "ScaledObject was created concurrently, treating as existing"
                );
                Ok(Outcome::AlreadyExists)
            }
            Err(ClientError::Store(e)) => {
                error!(
                    namespace = %target.namespace,
                    name = %target.name,
                    error = %format!("{:#}", e),
                    "Failed to create new ScaledObject"
                );
                Err(ReconcileError::Store(e))
            }
        }
    }
}
