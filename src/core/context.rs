//! Per-request operation context
//!
//! An [`OperationContext`] is created once per inbound request and passed by
//! reference into every CRUD operation. It carries the two switches that
//! change operation behavior without changing semantics: the runtime
//! environment (diagnostic gating) and the error propagation mode.

use serde::{Deserialize, Serialize};

/// Runtime environment, gating diagnostic detail in failure envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    /// Production never exposes diagnostic payloads
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// How a failed operation reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Write the failure envelope to the response directly
    #[default]
    Respond,
    /// Hand the classified error to the caller's own error chain
    Delegate,
}

/// Context owned by the caller for the lifetime of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationContext {
    pub environment: Environment,
    pub error_mode: ErrorMode,
}

impl OperationContext {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            error_mode: ErrorMode::Respond,
        }
    }

    /// Route failures to the caller's error chain instead of responding
    pub fn delegated(mut self) -> Self {
        self.error_mode = ErrorMode::Delegate;
        self
    }
}
