//! lanwatch-fusion: Observation fusion for the lanwatch device registry.
//!
//! Turns a group of observations that share one MAC into a single fused
//! device view, scores how trustworthy that view is, diffs it against the
//! previous view, and flags devices that violate uniqueness invariants.
//! Everything here is a pure function of its inputs: no I/O, no clocks
//! except the `now` callers pass in.

pub mod changes;
pub mod classify;
pub mod confidence;
pub mod conflict;
pub mod merge;
pub mod resolution;
pub mod uptime;

pub use changes::{detect_changes, DeviceView};
pub use classify::{Classification, Classifier, PatternClassifier};
pub use confidence::{calculate_confidence, ConfidenceConfig};
pub use conflict::{detect_conflicts, ConflictSubject};
pub use merge::FusionEngine;
pub use resolution::{Field, FieldResolution, Specificity};
pub use uptime::{calculate_uptime, UptimeStats};
