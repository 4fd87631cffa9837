//! Kindred - memory and context orchestration for a conversational companion
//!
//! Blends a bounded in-process session buffer with a durable, embedding-indexed
//! long-term store, merges both into a relevance-ranked context for each turn,
//! and routes completed turns back into the right tier.

pub mod classifier;
pub mod companion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod memory;
pub mod orchestrator;
pub mod personality;
pub mod testing;

pub use error::KindredError;
