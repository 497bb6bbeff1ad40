//! Error types for vbox-vm-status.
//!
//! This module defines all error types used throughout the crate, covering
//! the `VBoxManage` child process, parsing of its output, VM lookup and
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for vbox-vm-status operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Hypervisor Command Errors ===
    /// The `VBoxManage` program could not be found.
    #[error("VBoxManage not found at '{}'; is VirtualBox installed?", .program.display())]
    VBoxManageNotFound {
        /// The program path or name that was looked up.
        program: PathBuf,
    },

    /// Spawning a hypervisor command failed for a reason other than a missing program.
    #[error("failed to run {}: {source}", .program.display())]
    CommandSpawn {
        /// The program that failed to start.
        program: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A hypervisor command exited unsuccessfully.
    #[error("`{command}` failed ({}): {stderr}", exit_description(.code))]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// The exit code, if the process exited normally.
        code: Option<i32>,
        /// Trimmed standard error of the process.
        stderr: String,
    },

    /// A hypervisor command produced output that could not be understood.
    #[error("unexpected output from `{command}`: {message}")]
    MalformedOutput {
        /// The command whose output was parsed.
        command: String,
        /// Description of what was wrong.
        message: String,
    },

    // === Lookup Errors ===
    /// No VM matched a requested name.
    #[error("no virtual machine matches '{name}'")]
    VmNotFound {
        /// The name that was requested.
        name: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for vbox-vm-status operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a malformed output error for the given command.
    #[must_use]
    pub fn malformed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedOutput {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a VM not found error.
    #[must_use]
    pub fn vm_not_found(name: impl Into<String>) -> Self {
        Self::VmNotFound { name: name.into() }
    }

    /// Check if this error means something requested does not exist
    /// (the `VBoxManage` program or a named VM).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VBoxManageNotFound { .. } | Self::VmNotFound { .. })
    }

    /// Check if this error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
