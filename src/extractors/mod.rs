// src/extractors/mod.rs
pub mod classifier;
pub mod report;
pub mod text;

// Re-export key extraction types for convenience
pub use report::{extract_metrics, MetricRecord};
