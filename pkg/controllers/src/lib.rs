//! HPA -> ScaledObject transfer controller.
//!
//! [`hpa_transfer`] holds the reconcile decision logic, [`client`] the store
//! seam it reads and writes through, and [`manager`] the watch-driven loop
//! that decides when a reconcile runs.

pub mod client;
pub mod hpa_transfer;
pub mod manager;
