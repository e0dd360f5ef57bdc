// src/analysis/mod.rs
pub mod forecast;
pub mod qualitative;
pub mod trend;

pub use forecast::ForecastDocument;
pub use trend::NumericResults;
