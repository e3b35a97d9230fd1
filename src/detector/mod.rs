//! Obsolescence detection
//!
//! Decides from run telemetry whether the active artifact no longer represents
//! the target codebase. Detection is a pure function of its inputs; the caller
//! supplies the clock.

mod obsolescence;

pub use obsolescence::{
    known_languages, staleness_since, FreshnessState, ObsolescenceDetector, ObsolescenceResult, FIRST_RUN_REASON,
};
