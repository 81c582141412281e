//! State store key layout.

/// Prefix under which HorizontalPodAutoscalers are stored, keyed `<ns>/<name>`.
pub const HPA_PREFIX: &str = "/registry/hpa/";

/// Prefix under which ScaledObjects are stored, keyed `<ns>/<name>`.
pub const SCALED_OBJECT_PREFIX: &str = "/registry/scaledobjects/";

/// Watch events buffered per subscriber before it is told it lagged.
pub const EVENT_LOG_CAPACITY: usize = 1024;
