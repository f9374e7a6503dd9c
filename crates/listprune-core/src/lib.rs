//! Core pruning engine for listprune
//!
//! This crate contains:
//! - Identifier normalization (first-letter case folding, subpage stripping)
//! - Status classification against an [`ActivityDirectory`]
//! - Run-time pattern derivation (removal and rename patterns)
//! - Document rewriting
//! - The [`Pruner`] orchestrator tying a single pass together

pub mod classify;
pub mod derive;
pub mod directory;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod rewrite;

pub use classify::{Classifier, Disposition};
pub use derive::PatternDeriver;
pub use directory::ActivityDirectory;
pub use engine::{PruneResult, Pruner};
pub use error::{CoreError, Result};
pub use identifier::{normalize, CaseOverrides};
