//! Build context - template variables and environment shared by all stages

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Execution context for a pipeline run
///
/// Holds the variables stage commands are rendered with and the environment
/// exported to every command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildContext {
    /// Derived and configured variables
    pub variables: HashMap<String, String>,

    /// Variables set on the command line; these win over everything else
    pub overrides: HashMap<String, String>,

    /// Environment variables exported to stage commands
    pub env: Vec<(String, String)>,

    /// Working directory for stage commands
    pub workdir: Option<String>,
}

impl BuildContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    /// Get a variable, honoring overrides
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.overrides.get(key).or_else(|| self.variables.get(key))
    }

    /// Override a variable from the command line
    pub fn set_override(&mut self, key: String, value: String) {
        self.overrides.insert(key, value);
    }

    /// Get all variables for template rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();
        vars.extend(self.overrides.clone());
        vars
    }
}
