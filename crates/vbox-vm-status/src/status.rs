//! Status collection.
//!
//! Combines the VM listing, the running listing and (optionally) per-VM
//! details into a [`StatusReport`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::vbox::Hypervisor;
use crate::vm::{VmEntry, VmStatus};

/// Which VMs to keep by run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    /// Keep every VM.
    #[default]
    All,
    /// Keep running VMs only.
    Running,
    /// Keep VMs that are not running.
    Stopped,
}

impl StateFilter {
    /// Check whether `vm` passes this filter.
    #[must_use]
    pub fn matches(self, vm: &VmStatus) -> bool {
        match self {
            Self::All => true,
            Self::Running => vm.running,
            Self::Stopped => !vm.running,
        }
    }
}

/// What to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    /// Restrict the report to these VM names. Empty means every VM.
    pub names: Vec<String>,
    /// Run-state filter, applied after details are fetched.
    pub filter: StateFilter,
    /// Fetch per-VM details (`showvminfo`).
    pub details: bool,
    /// Maximum detail queries in flight at once.
    pub max_concurrent: usize,
}

impl Default for StatusQuery {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            filter: StateFilter::All,
            details: false,
            max_concurrent: 4,
        }
    }
}

/// The collected status of a set of VMs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// When the report was collected.
    pub generated_at: DateTime<Utc>,
    /// The hypervisor backend that was queried.
    pub hypervisor: String,
    /// Per-VM status, sorted by name.
    pub vms: Vec<VmStatus>,
}

impl StatusReport {
    /// Number of VMs in the report.
    #[must_use]
    pub fn total(&self) -> usize {
        self.vms.len()
    }

    /// Number of running VMs in the report.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.vms.iter().filter(|vm| vm.running).count()
    }

    /// Check if the report contains no VMs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }
}

/// Collect the status of the VMs selected by `query`.
///
/// # Errors
///
/// Returns an error if either listing fails, or [`Error::VmNotFound`] if a
/// requested name matches no VM. Failures fetching details of individual
/// VMs are recorded on the VM instead of failing the report.
pub async fn collect_status(
    hypervisor: Arc<dyn Hypervisor>,
    query: &StatusQuery,
) -> Result<StatusReport> {
    let (all, running) = tokio::try_join!(hypervisor.list_vms(), hypervisor.list_running_vms())?;
    debug!(
        hypervisor = hypervisor.name(),
        total = all.len(),
        running = running.len(),
        "Listed VMs"
    );

    let running_ids: HashSet<String> = running.into_iter().map(|entry| entry.uuid).collect();

    let mut vms: Vec<VmStatus> = select_by_name(all, &query.names)?
        .into_iter()
        .map(|entry| {
            let is_running = running_ids.contains(&entry.uuid);
            VmStatus::new(entry, is_running)
        })
        .collect();

    if query.details {
        fetch_details(&hypervisor, &mut vms, query.max_concurrent).await?;
    }

    vms.retain(|vm| query.filter.matches(vm));
    vms.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.uuid.cmp(&b.uuid))
    });

    Ok(StatusReport {
        generated_at: Utc::now(),
        hypervisor: hypervisor.name().to_string(),
        vms,
    })
}

/// Select the entries named by `names`.
///
/// Each name selects the entries whose name equals it case-insensitively,
/// or, when there is no exact match, the entries whose name contains it.
///
/// # Errors
///
/// Returns [`Error::VmNotFound`] for the first name that selects nothing.
pub fn select_by_name(entries: Vec<VmEntry>, names: &[String]) -> Result<Vec<VmEntry>> {
    if names.is_empty() {
        return Ok(entries);
    }

    let lowered: Vec<String> = entries.iter().map(|e| e.name.to_lowercase()).collect();
    let mut selected = vec![false; entries.len()];

    for name in names {
        let wanted = name.to_lowercase();
        let exact: Vec<usize> = (0..entries.len()).filter(|&i| lowered[i] == wanted).collect();
        let hits = if exact.is_empty() {
            (0..entries.len())
                .filter(|&i| lowered[i].contains(&wanted))
                .collect()
        } else {
            exact
        };

        if hits.is_empty() {
            return Err(Error::vm_not_found(name));
        }
        for i in hits {
            selected[i] = true;
        }
    }

    Ok(entries
        .into_iter()
        .zip(selected)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect())
}

async fn fetch_details(
    hypervisor: &Arc<dyn Hypervisor>,
    vms: &mut [VmStatus],
    max_concurrent: usize,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for (index, vm) in vms.iter().enumerate() {
        let hypervisor = Arc::clone(hypervisor);
        let semaphore = Arc::clone(&semaphore);
        let uuid = vm.uuid.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, hypervisor.vm_details(&uuid).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, result) =
            joined.map_err(|e| Error::internal(format!("detail query task failed: {e}")))?;
        let vm = &mut vms[index];
        match result {
            Ok(details) => vm.set_details(details),
            Err(err) => {
                warn!(vm = %vm.name, uuid = %vm.uuid, error = %err, "Could not fetch VM details");
                vm.error = Some(err.to_string());
            }
        }
    }

    Ok(())
}
