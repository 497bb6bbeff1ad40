//! Platform-specific defaults.

use std::path::PathBuf;

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "macOS"
    } else if cfg!(target_os = "windows") {
        "Windows"
    } else if cfg!(target_os = "linux") {
        "Linux"
    } else {
        "Unix"
    }
}

/// Where `VBoxManage` lives when VirtualBox is installed the standard way.
///
/// On Linux and other Unix systems the installer puts it on `PATH`.
#[must_use]
pub fn default_vboxmanage_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/VirtualBox.app/Contents/MacOS/VBoxManage")
    } else if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\Program Files\Oracle\VirtualBox\VBoxManage.exe")
    } else {
        PathBuf::from("VBoxManage")
    }
}
