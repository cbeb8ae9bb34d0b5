//! # Processing Engine
//!
//! Coordinates stem separation, analysis and the results cache for local and
//! downloaded recordings.

pub mod engine;

pub use engine::{AnalysisOutcome, ProcessedTrack, ProcessingEngine};
