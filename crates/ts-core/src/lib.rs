//! Data model, error kinds, capture-request validation, and configuration
//! shared across the timbrescope workspace.
//!
//! No audio I/O lives here: sources and the analysis stages are in
//! `ts-audio`, the trial driver in `ts-app`.

pub mod config;
pub mod error;
pub mod model;
pub mod request;
pub mod traits;

pub use config::SessionConfig;
pub use error::AnalysisError;
pub use model::{AveragedResult, ClusterSet, FrequencyCluster, Recording, Spectrum};
pub use request::{CaptureRequest, MAX_DURATION_SECS, MAX_SAMPLE_RATE_HZ};
