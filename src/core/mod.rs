//! Core domain models for stagegate
//!
//! This module defines the branch policy, the stages it selects, the
//! per-run build environment and the pipeline configuration they come from.

pub mod branch;
pub mod config;
pub mod context;
pub mod defaults;
pub mod pipeline;
pub mod policy;
pub mod stage;
pub mod state;
pub mod tags;

pub use branch::*;
pub use context::*;
pub use pipeline::*;
pub use policy::*;
pub use stage::*;
pub use state::*;
pub use tags::*;
