//! HPA -> ScaledObject transfer markers.

/// Annotation opting an HPA into transfer. Only the literal `"true"` matches.
pub const TRANSFER_ANNOTATION: &str = "transfer-hpa";

/// Annotation that blocks transfer when it equals [`ANNOTATION_TRUE`].
pub const MANAGED_BY_ANNOTATION: &str = "app.kubernetes.io/managed-by";

pub const ANNOTATION_TRUE: &str = "true";

/// Suffix appended to the HPA name to form the ScaledObject name.
pub const SCALED_OBJECT_SUFFIX: &str = "-scaledobject";

/// Provenance annotations stamped on every created ScaledObject.
pub const TRANSFER_OWNERSHIP_ANNOTATION: &str = "scaledobject.keda.sh/transfer-hpa-ownership";
pub const HPA_OWNERSHIP_VALIDATION_ANNOTATION: &str = "validations.keda.sh/hpa-ownership";

/// Owner reference coordinates of the source resource.
pub const HPA_API_VERSION: &str = "autoscaling/v1";
pub const HPA_KIND: &str = "HorizontalPodAutoscaler";
