//! Scenario-based tests for stagegate

mod helpers;

mod branch_policy;
mod failure_handling;
mod image_publish;
mod security_scans;
