//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use engine::{EngineError, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionResult, StageExecutor};
pub use runner::{CommandOutput, CommandRunner, DryRunRunner, RunnerError, ShellRunner};
pub use scheduler::{Batch, ExecutionScheduler};
