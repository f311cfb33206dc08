//! # Nuke
//!
//! Cleanup of orphaned provider resources: discover them, delete them, and track
//! their disappearance until nothing is left.

mod actions;
mod tracker;

pub use actions::{nuke_pipeline, Adapters, CheckDone, Converge, DeleteResources, Discover, NukeState, PatchProgress};
pub use tracker::{
    ConvergenceTracker, ProviderResourceAdapter, ProviderResourceKindState, ProviderResourceObject,
};
