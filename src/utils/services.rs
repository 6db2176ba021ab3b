// src/utils/services.rs

/// Outcome of a service toggle that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceChange {
    Applied,
    /// The service does not exist on this machine; nothing to do.
    NotInstalled,
}

/// Operating-system services a feature toggles besides registry values.
pub trait ServiceControl: Send + Sync {
    /// Disabling stops a running service and sets its start type to disabled.
    /// Enabling sets the start type to automatic and starts it.
    fn set_service_enabled(&self, name: &str, enabled: bool) -> anyhow::Result<ServiceChange>;

    /// Runs a PowerShell command, failing on a non-zero exit.
    fn run_powershell(&self, script: &str) -> anyhow::Result<()>;
}

/// The service controller for the current platform.
#[cfg(windows)]
pub type SystemServices = WindowsServices;
#[cfg(not(windows))]
pub type SystemServices = UnsupportedServices;

#[cfg(windows)]
pub use scm::WindowsServices;

#[cfg(windows)]
mod scm {
    use std::{os::windows::process::CommandExt, process::Command};

    use anyhow::Context;
    use tracing::{debug, warn};
    use widestring::U16CString;
    use windows::{
        core::PCWSTR,
        Win32::{
            Foundation::{ERROR_SERVICE_ALREADY_RUNNING, ERROR_SERVICE_DOES_NOT_EXIST},
            System::{
                Services::{
                    ChangeServiceConfigW, CloseServiceHandle, ControlService, OpenSCManagerW,
                    OpenServiceW, QueryServiceStatus, StartServiceW, ENUM_SERVICE_TYPE, SC_HANDLE,
                    SC_MANAGER_CONNECT, SERVICE_AUTO_START, SERVICE_CHANGE_CONFIG,
                    SERVICE_CONTROL_STOP, SERVICE_DISABLED, SERVICE_ERROR, SERVICE_NO_CHANGE,
                    SERVICE_QUERY_STATUS, SERVICE_RUNNING, SERVICE_START, SERVICE_STATUS,
                    SERVICE_STOP,
                },
                Threading::CREATE_NO_WINDOW,
            },
        },
    };

    use super::{ServiceChange, ServiceControl};

    /// Closes a service or SCM handle when dropped.
    struct ServiceHandleGuard {
        handle: SC_HANDLE,
    }

    impl Drop for ServiceHandleGuard {
        fn drop(&mut self) {
            if let Err(e) = unsafe { CloseServiceHandle(self.handle) } {
                warn!("CloseServiceHandle failed: {:?}", e);
            }
        }
    }

    /// Controls services through the Windows Service Control Manager.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsServices;

    impl WindowsServices {
        pub fn new() -> Self {
            Self
        }
    }

    impl ServiceControl for WindowsServices {
        fn set_service_enabled(&self, name: &str, enabled: bool) -> anyhow::Result<ServiceChange> {
            let scm = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
                .context("Failed to open Service Control Manager")?;
            let scm = ServiceHandleGuard { handle: scm };

            let wide_name = U16CString::from_str(name)
                .with_context(|| format!("Invalid service name '{}'", name))?;
            let access =
                SERVICE_CHANGE_CONFIG | SERVICE_QUERY_STATUS | SERVICE_START | SERVICE_STOP;
            let service = match unsafe {
                OpenServiceW(scm.handle, PCWSTR::from_raw(wide_name.as_ptr()), access)
            } {
                Ok(handle) => ServiceHandleGuard { handle },
                Err(e) if e.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult() => {
                    debug!("Service '{}' does not exist.", name);
                    return Ok(ServiceChange::NotInstalled);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to open service '{}'", name))
                }
            };

            let mut status = SERVICE_STATUS::default();
            unsafe { QueryServiceStatus(service.handle, &mut status) }
                .with_context(|| format!("Failed to query status of '{}'", name))?;
            let running = status.dwCurrentState == SERVICE_RUNNING;

            if !enabled && running {
                let mut stop_status = SERVICE_STATUS::default();
                if let Err(e) =
                    unsafe { ControlService(service.handle, SERVICE_CONTROL_STOP, &mut stop_status) }
                {
                    warn!("Failed to stop service '{}': {:?}", name, e);
                } else {
                    debug!("Stopped service '{}'.", name);
                }
            }

            let start_type = if enabled {
                SERVICE_AUTO_START
            } else {
                SERVICE_DISABLED
            };
            unsafe {
                ChangeServiceConfigW(
                    service.handle,
                    ENUM_SERVICE_TYPE(SERVICE_NO_CHANGE),
                    start_type,
                    SERVICE_ERROR(SERVICE_NO_CHANGE),
                    PCWSTR::null(),
                    PCWSTR::null(),
                    None,
                    PCWSTR::null(),
                    PCWSTR::null(),
                    PCWSTR::null(),
                    PCWSTR::null(),
                )
            }
            .with_context(|| format!("Failed to change start type of '{}'", name))?;

            if enabled && !running {
                match unsafe { StartServiceW(service.handle, None) } {
                    Ok(()) => debug!("Started service '{}'.", name),
                    Err(e) if e.code() == ERROR_SERVICE_ALREADY_RUNNING.to_hresult() => {}
                    Err(e) => warn!("Service '{}' may not have started: {:?}", name, e),
                }
            }

            Ok(ServiceChange::Applied)
        }

        fn run_powershell(&self, script: &str) -> anyhow::Result<()> {
            let output = Command::new("powershell.exe")
                .args(["-NoProfile", "-NonInteractive", "-Command", script])
                .creation_flags(CREATE_NO_WINDOW.0)
                .output()
                .context("Failed to launch powershell.exe")?;

            if !output.status.success() {
                anyhow::bail!(
                    "PowerShell exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(())
        }
    }
}

/// Stand-in used where there is no Service Control Manager: every call fails.
#[cfg(not(windows))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedServices;

#[cfg(not(windows))]
impl UnsupportedServices {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl ServiceControl for UnsupportedServices {
    fn set_service_enabled(&self, name: &str, _enabled: bool) -> anyhow::Result<ServiceChange> {
        anyhow::bail!(
            "Cannot configure service '{}': service control is only available on Windows",
            name
        )
    }

    fn run_powershell(&self, _script: &str) -> anyhow::Result<()> {
        anyhow::bail!("PowerShell is only available on Windows")
    }
}
