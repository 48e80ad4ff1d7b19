//! Tool-use policy enforcement.
//!
//! A job's [`ToolPolicy`] is checked at every boundary where the job would
//! reach outside the process: before any subprocess, before any network
//! use, and before any named tool call a model client wants to make.

use crate::model::ToolPolicy;

/// A job attempted something its tool policy does not permit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("subprocess_not_allowed")]
    SubprocessNotAllowed,

    #[error("network_not_allowed")]
    NetworkNotAllowed,

    #[error("tool_not_allowed:{0}")]
    ToolNotAllowed(String),
}

impl ToolPolicy {
    pub fn require_subprocess(&self) -> Result<(), PolicyError> {
        if self.allow_subprocess {
            Ok(())
        } else {
            Err(PolicyError::SubprocessNotAllowed)
        }
    }

    /// Gate for executors that reach the network, such as a model client's
    /// tool calls. None of the built-in executors do.
    pub fn require_network(&self) -> Result<(), PolicyError> {
        if self.allow_network {
            Ok(())
        } else {
            Err(PolicyError::NetworkNotAllowed)
        }
    }

    /// Filter a named tool call against `allowed_tools`. Names match exactly.
    pub fn check_tool_call(&self, name: &str) -> Result<(), PolicyError> {
        if self.allowed_tools.iter().any(|t| t == name) {
            Ok(())
        } else {
            Err(PolicyError::ToolNotAllowed(name.to_string()))
        }
    }
}
