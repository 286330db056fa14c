//! Spectrum transform, frequency clustering, cross-trial aggregation, and the
//! capture sources feeding them.

pub mod aggregate;
pub mod capture;
pub mod cluster;
pub mod decode;
pub mod error;
pub mod fft;
pub mod synth;

pub use aggregate::{AggregationBuffer, TrialAggregator, TrialEnergyVector};
pub use capture::{MicrophoneSource, list_input_devices};
pub use cluster::FrequencyClusterer;
pub use decode::FileSource;
pub use error::AudioError;
pub use fft::SpectrumTransformer;
pub use synth::{Partial, ToneSource};
