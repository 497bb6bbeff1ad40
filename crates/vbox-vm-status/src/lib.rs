//! `vbox-vm-status` - Show the status of VirtualBox virtual machines
//!
//! This library queries VirtualBox through its `VBoxManage` command-line tool,
//! collects which VMs exist and which are running, and renders the result as
//! plain text, a table, or JSON.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod completions;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod report;
pub mod status;
pub mod vbox;
pub mod vm;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use report::{render, OutputFormat, RenderOptions};
pub use status::{collect_status, StateFilter, StatusQuery, StatusReport};
pub use vbox::{Hypervisor, VBoxManage};
pub use vm::{VmDetails, VmEntry, VmState, VmStatus};
