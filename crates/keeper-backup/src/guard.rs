//! Service guard.
//!
//! Backups and restores of live Rundeck data are only consistent while the
//! service is stopped. A [`ServiceGuard`] reports and controls the service;
//! [`run_guarded`] applies a [`ServicePolicy`] around an operation.

use crate::error::{Error, Result};
use keeper_core::config::ServicePolicy;
use std::cell::{Cell, RefCell};
use std::process::Command;
use tracing::{debug, info, warn};

/// Queries and controls the service whose data is being backed up.
pub trait ServiceGuard {
    /// Name used in messages
    fn name(&self) -> &str;

    fn is_running(&self) -> Result<bool>;

    fn stop(&self) -> Result<()>;

    fn start(&self) -> Result<()>;
}

/// Controls a systemd unit through `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdGuard {
    unit: String,
}

impl SystemdGuard {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    fn systemctl(&self, action: &str) -> Result<()> {
        debug!("Running systemctl {} {}", action, self.unit);
        let output = Command::new("systemctl")
            .args([action, self.unit.as_str()])
            .output()
            .map_err(|e| Error::service(format!("failed to run systemctl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::service(format!(
                "systemctl {} {} failed: {}",
                action,
                self.unit,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl ServiceGuard for SystemdGuard {
    fn name(&self) -> &str {
        &self.unit
    }

    fn is_running(&self) -> Result<bool> {
        // is-active exits non-zero for inactive, failed and unknown units
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet", self.unit.as_str()])
            .status()
            .map_err(|e| Error::service(format!("failed to run systemctl: {}", e)))?;
        Ok(status.success())
    }

    fn stop(&self) -> Result<()> {
        self.systemctl("stop")
    }

    fn start(&self) -> Result<()> {
        self.systemctl("start")
    }
}

/// In-memory guard with a fixed starting state. Records every control call.
#[derive(Debug, Default)]
pub struct StaticGuard {
    running: Cell<bool>,
    calls: RefCell<Vec<&'static str>>,
}

impl StaticGuard {
    pub fn new(running: bool) -> Self {
        Self {
            running: Cell::new(running),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Control calls made so far ("stop" / "start")
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

impl ServiceGuard for StaticGuard {
    fn name(&self) -> &str {
        "static"
    }

    fn is_running(&self) -> Result<bool> {
        Ok(self.running.get())
    }

    fn stop(&self) -> Result<()> {
        self.calls.borrow_mut().push("stop");
        self.running.set(false);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.calls.borrow_mut().push("start");
        self.running.set(true);
        Ok(())
    }
}

/// Runs `op` under `policy`.
///
/// - `Refuse`: fails with [`Error::ServiceRunning`] if the service is up.
/// - `StopStart`: stops a running service and starts it again afterwards,
///   whether or not `op` succeeded. The error of `op` takes precedence over
///   a failed restart.
/// - `Ignore`: proceeds regardless, with a warning if the service is up.
pub fn run_guarded<G, T, F>(guard: &G, policy: ServicePolicy, op: F) -> Result<T>
where
    G: ServiceGuard + ?Sized,
    F: FnOnce() -> Result<T>,
{
    match policy {
        ServicePolicy::Refuse => {
            if guard.is_running()? {
                return Err(Error::service_running(guard.name()));
            }
            op()
        }
        ServicePolicy::Ignore => {
            match guard.is_running() {
                Ok(true) => warn!(
                    "Service {} is running; data may change during the operation",
                    guard.name()
                ),
                Ok(false) => {}
                Err(e) => warn!("Could not check service {}: {}", guard.name(), e),
            }
            op()
        }
        ServicePolicy::StopStart => {
            if !guard.is_running()? {
                return op();
            }

            info!("Stopping service {}", guard.name());
            guard.stop()?;

            let result = op();

            info!("Starting service {}", guard.name());
            match (result, guard.start()) {
                (Ok(value), Ok(())) => Ok(value),
                (Ok(_), Err(e)) => Err(e),
                (Err(e), restart) => {
                    if let Err(restart_err) = restart {
                        warn!("Service {} failed to restart: {}", guard.name(), restart_err);
                    }
                    Err(e)
                }
            }
        }
    }
}
