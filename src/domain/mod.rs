//! Core data model: the association map, vocabulary, observation log,
//! similarity scoring, trend tracking and shared synthesis settings.

pub mod assoc;
pub mod error;
pub mod observations;
pub mod settings;
pub mod similarity;
pub mod trend;
pub mod vocabulary;

pub use assoc::{AssocKey, AssocMap};
pub use observations::ObservationLog;
pub use settings::{SynthesisLimits, SynthesisSettings, SynthesisSnapshot};
pub use similarity::{judge_redundancy, proximity_similarity, Redundancy};
pub use trend::{Trend, TrendTracker};
pub use vocabulary::Vocabulary;
