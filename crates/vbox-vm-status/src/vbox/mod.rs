//! Hypervisor access.
//!
//! [`Hypervisor`] is the seam the status collector talks to; [`VBoxManage`]
//! implements it by running VirtualBox's `VBoxManage` command-line tool.

pub mod parse;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::vm::{VmDetails, VmEntry};

pub use parse::{parse_machine_readable, parse_vm_list};

/// A source of VM inventory and state.
#[async_trait]
pub trait Hypervisor: Send + Sync + std::fmt::Debug {
    /// The name of this hypervisor backend (for logging).
    fn name(&self) -> &'static str;

    /// List every registered VM.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor cannot be queried.
    async fn list_vms(&self) -> Result<Vec<VmEntry>>;

    /// List the VMs that currently have a running process.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor cannot be queried.
    async fn list_running_vms(&self) -> Result<Vec<VmEntry>>;

    /// Fetch detailed properties of one VM, identified by UUID.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM cannot be queried (e.g. it is inaccessible).
    async fn vm_details(&self, uuid: &str) -> Result<VmDetails>;

    /// The hypervisor's version string.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor cannot be queried.
    async fn version(&self) -> Result<String>;
}

/// [`Hypervisor`] backed by the `VBoxManage` CLI.
#[derive(Debug, Clone)]
pub struct VBoxManage {
    program: PathBuf,
    timeout: Duration,
}

impl VBoxManage {
    /// Create a client that runs `program` with the given per-call timeout.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// The program this client runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut command = self.program.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }

    /// Run `VBoxManage` with `args` and return its stdout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VBoxManageNotFound`] if the program does not exist,
    /// [`Error::Timeout`] if it does not finish in time, and
    /// [`Error::CommandFailed`] if it exits unsuccessfully.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let description = self.describe(args);
        debug!(command = %description, "Running VBoxManage");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    Error::VBoxManageNotFound {
                        program: self.program.clone(),
                    }
                } else {
                    Error::CommandSpawn {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout {
                operation: description.clone(),
            })??;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: description,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(command = %description, bytes = stdout.len(), "VBoxManage finished");
        Ok(stdout)
    }

    async fn list(&self, which: &str) -> Result<Vec<VmEntry>> {
        let args = ["list", which];
        let output = self.run(&args).await?;
        parse_vm_list(&self.describe(&args), &output)
    }
}

#[async_trait]
impl Hypervisor for VBoxManage {
    fn name(&self) -> &'static str {
        "VirtualBox"
    }

    async fn list_vms(&self) -> Result<Vec<VmEntry>> {
        self.list("vms").await
    }

    async fn list_running_vms(&self) -> Result<Vec<VmEntry>> {
        self.list("runningvms").await
    }

    async fn vm_details(&self, uuid: &str) -> Result<VmDetails> {
        let args = ["showvminfo", uuid, "--machinereadable"];
        let output = self.run(&args).await?;
        let properties = parse_machine_readable(&output);
        VmDetails::from_properties(&self.describe(&args), &properties)
    }

    async fn version(&self) -> Result<String> {
        let output = self.run(&["--version"]).await?;
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let vbox = VBoxManage::new("VBoxManage", Duration::from_secs(5));
        assert_eq!(vbox.describe(&["list", "vms"]), "VBoxManage list vms");
        assert_eq!(vbox.program(), Path::new("VBoxManage"));
        assert_eq!(vbox.timeout(), Duration::from_secs(5));
        assert_eq!(vbox.name(), "VirtualBox");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let vbox = VBoxManage::new(
            "/nonexistent/path/to/VBoxManage",
            Duration::from_secs(5),
        );
        let err = vbox.list_vms().await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
        assert!(err.to_string().contains("/nonexistent/path/to/VBoxManage"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_exit_code() {
        // `false` ignores its arguments and exits 1
        let vbox = VBoxManage::new("false", Duration::from_secs(5));
        let err = vbox.list_running_vms().await.unwrap_err();
        match err {
            Error::CommandFailed { command, code, .. } => {
                assert_eq!(command, "false list runningvms");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let vbox = VBoxManage::new("echo", Duration::from_secs(5));
        let output = vbox.run(&["\"dev\"", "{1234}"]).await.unwrap();
        assert_eq!(output.trim(), "\"dev\" {1234}");

        let entries = parse_vm_list("echo", &output).unwrap();
        assert_eq!(entries, vec![VmEntry::new("dev", "1234")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_program_times_out() {
        let vbox = VBoxManage::new("sleep", Duration::from_millis(100));
        let err = vbox.run(&["5"]).await.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
    }
}
