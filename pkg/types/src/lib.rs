pub mod config;
pub mod hpa;
pub mod meta;
pub mod scaledobject;
