//! Council deliberation module.
//!
//! A council run has three stages:
//! - Stage 1: every member answers the question independently
//! - Stage 2: members rank the anonymized answers, scores are aggregated
//! - Stage 3: the chairman synthesizes one final answer
//!
//! [`deliberate`] drives all three and reports progress through an
//! [`crate::events::EventSink`].

pub mod deliberate;
pub mod labels;
pub mod ranking;
pub mod types;

// Re-export main entry points
pub use deliberate::{deliberate, CouncilError, CHAIRMAN_TIMEOUT};
pub use labels::LabelTable;
pub use ranking::{aggregate_rankings, parse_ranking};
pub use types::*;
