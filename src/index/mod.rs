// src/index/mod.rs
pub mod chunker;
pub mod store;

pub use store::SemanticIndex;
