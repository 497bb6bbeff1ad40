//! Core VM types for vbox-vm-status.
//!
//! This module defines the data structures describing virtual machines as
//! reported by the hypervisor: listing entries, machine states, detailed
//! properties, and the merged per-VM status shown to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a VM listing (`VBoxManage list vms`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmEntry {
    /// The VM's display name. Not unique; VirtualBox allows duplicates.
    pub name: String,
    /// The VM's UUID, unique per host.
    pub uuid: String,
}

impl VmEntry {
    /// Create a new listing entry.
    #[must_use]
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

/// Machine state as reported by `showvminfo --machinereadable` (`VMState`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VmState {
    /// Powered off.
    PoweredOff,
    /// State saved to disk.
    Saved,
    /// The VM process terminated abnormally.
    Aborted,
    /// Moved to another host by teleportation.
    Teleported,
    /// Running.
    Running,
    /// Paused.
    Paused,
    /// Stuck in a guru meditation (fatal VMM error).
    GuruMeditation,
    /// Booting up.
    Starting,
    /// Shutting down.
    Stopping,
    /// Saving its state.
    Saving,
    /// Restoring from a saved state.
    Restoring,
    /// Being teleported away.
    Teleporting,
    /// Taking a snapshot while running.
    LiveSnapshotting,
    /// Taking a snapshot while powered off.
    Snapshotting,
    /// Deleting a snapshot.
    DeletingSnapshot,
    /// Being set up (e.g. media being attached).
    SettingUp,
    /// Any state this tool does not know about, kept verbatim.
    Other(String),
}

impl VmState {
    /// Parse a `VMState` value. Never fails; unknown states become [`VmState::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "poweroff" | "poweredoff" => Self::PoweredOff,
            "saved" => Self::Saved,
            "aborted" => Self::Aborted,
            "teleported" => Self::Teleported,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "gurumeditation" => Self::GuruMeditation,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "saving" => Self::Saving,
            "restoring" => Self::Restoring,
            "teleporting" | "teleportingpausedvm" | "teleportingin" => Self::Teleporting,
            "livesnapshotting" | "onlinesnapshotting" => Self::LiveSnapshotting,
            "snapshotting" => Self::Snapshotting,
            "deletingsnapshot" | "deletingsnapshotlive" | "deletingsnapshotlivepaused" => {
                Self::DeletingSnapshot
            }
            "settingup" => Self::SettingUp,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    /// The machine-readable name, as `VBoxManage` prints it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PoweredOff => "poweroff",
            Self::Saved => "saved",
            Self::Aborted => "aborted",
            Self::Teleported => "teleported",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::GuruMeditation => "gurumeditation",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Saving => "saving",
            Self::Restoring => "restoring",
            Self::Teleporting => "teleporting",
            Self::LiveSnapshotting => "livesnapshotting",
            Self::Snapshotting => "snapshotting",
            Self::DeletingSnapshot => "deletingsnapshot",
            Self::SettingUp => "settingup",
            Self::Other(raw) => raw,
        }
    }

    /// Whether a VM process exists in this state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            Self::PoweredOff | Self::Saved | Self::Aborted | Self::Teleported | Self::Other(_)
        )
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoweredOff => write!(f, "powered off"),
            Self::GuruMeditation => write!(f, "guru meditation"),
            Self::LiveSnapshotting => write!(f, "live snapshotting"),
            Self::DeletingSnapshot => write!(f, "deleting snapshot"),
            Self::SettingUp => write!(f, "setting up"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl From<String> for VmState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<VmState> for String {
    fn from(state: VmState) -> Self {
        state.as_str().to_string()
    }
}

/// Detailed properties of a single VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDetails {
    /// Current machine state.
    pub state: VmState,

    /// When the VM entered its current state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_changed_at: Option<DateTime<Utc>>,

    /// Guest OS type description (e.g. "Ubuntu (64-bit)").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,

    /// Configured guest memory in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,

    /// Configured virtual CPU count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,

    /// VM groups (e.g. "/", "/servers").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl VmDetails {
    /// Create details carrying only a state.
    #[must_use]
    pub fn with_state(state: VmState) -> Self {
        Self {
            state,
            state_changed_at: None,
            os_type: None,
            memory_mb: None,
            cpus: None,
            groups: Vec::new(),
        }
    }
}

/// The merged status of one VM, as shown in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatus {
    /// The VM's display name.
    pub name: String,

    /// The VM's UUID.
    pub uuid: String,

    /// Whether the VM is running (appears in the running listing or is in
    /// an active state).
    pub running: bool,

    /// Detailed properties, when requested and available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<VmDetails>,

    /// Why details could not be fetched, if they were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VmStatus {
    /// Create a status from a listing entry and running flag.
    #[must_use]
    pub fn new(entry: VmEntry, running: bool) -> Self {
        Self {
            name: entry.name,
            uuid: entry.uuid,
            running,
            details: None,
            error: None,
        }
    }

    /// Attach detailed properties, folding their state into `running`.
    pub fn set_details(&mut self, details: VmDetails) {
        self.running = self.running || details.state.is_active();
        self.details = Some(details);
    }

    /// Human-readable state: the detailed state if known, otherwise
    /// `running` / `not running`.
    #[must_use]
    pub fn state_label(&self) -> String {
        match &self.details {
            Some(details) => details.state.to_string(),
            None if self.running => "running".to_string(),
            None => "not running".to_string(),
        }
    }
}
