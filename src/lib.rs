//! stagegate - branch-aware CI/CD pipeline runner

pub mod cli;
pub mod core;
pub mod demo;
pub mod execution;
pub mod registry;
pub mod setup;

// Re-export commonly used types
pub use core::{BranchKind, BuildEnv, ExecutionStatus, Pipeline, Stage, StageKind, StagePolicy, StageState};
pub use execution::{CommandRunner, ExecutionEngine, ExecutionEvent, ShellRunner};
pub use registry::RegistryClient;
