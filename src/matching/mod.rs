//! Automatic matching of imported transactions against ledger movements

pub mod engine;
pub mod text;

pub use engine::{MatchCandidate, MatchingEngine};
