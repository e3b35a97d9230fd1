//! Driving process and external collaborators
//!
//! The driver sequences detection → approval → generate/build/validate →
//! registration for one codebase. Generation, build and validation runs are
//! external processes reached through the collaborator traits, each bounded by
//! the configured timeout.

mod collaborators;
mod driver;
mod process;

pub use collaborators::{
    ArtifactBuilder, ArtifactGenerator, ArtifactRunner, BinaryRunner, BuildOutcome,
    CommandBuilder, CommandGenerator, GeneratedArtifact, GenerationRequest, RunOutcome,
};
pub use driver::{build_request, CycleInput, CycleOutcome, CycleReport, LifecycleDriver};
pub use process::{CommandOutput, ProcessRunner};
