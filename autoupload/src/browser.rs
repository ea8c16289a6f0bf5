//! Browser process control: close every running browser before a pass,
//! launch the channel's browser when there is work.

use crate::errors::AutomationError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Browsers closed before every pass, besides the channel's own executable.
pub const KNOWN_BROWSERS: &[&str] = &["chrome", "msedge", "firefox"];
const CLOSE_GRACE: Duration = Duration::from_secs(3);

#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Closes all known browser processes. Returns how many were targeted.
    async fn close_all(&self) -> Result<usize, AutomationError>;

    async fn launch(&self) -> Result<(), AutomationError>;
}

pub struct DesktopBrowser {
    exe: PathBuf,
    names: HashSet<String>,
    grace: Duration,
}

impl DesktopBrowser {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        let exe = exe.into();
        let mut names: HashSet<String> = KNOWN_BROWSERS.iter().map(|s| s.to_string()).collect();
        if let Some(stem) = exe.file_stem() {
            names.insert(stem.to_string_lossy().to_lowercase());
        }
        Self {
            exe,
            names,
            grace: CLOSE_GRACE,
        }
    }

    pub fn matches(&self, process_name: &str) -> bool {
        let name = process_name.to_lowercase();
        let name = name.strip_suffix(".exe").unwrap_or(&name);
        self.names.contains(name)
    }

    fn targets(&self, system: &System) -> Vec<Pid> {
        let own = std::process::id();
        system
            .processes()
            .iter()
            .filter(|(pid, p)| pid.as_u32() != own && self.matches(&p.name().to_string_lossy()))
            .map(|(pid, _)| *pid)
            .collect()
    }
}

#[cfg(windows)]
fn request_close(_system: &System, pid: Pid) {
    // No /F: taskkill posts WM_CLOSE so tabs and profiles are saved.
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.as_u32().to_string()])
        .output();
    if let Err(e) = status {
        debug!("taskkill for {pid} failed: {e}");
    }
}

#[cfg(not(windows))]
fn request_close(system: &System, pid: Pid) {
    if let Some(process) = system.process(pid) {
        if process.kill_with(sysinfo::Signal::Term).is_none() {
            debug!("SIGTERM unsupported for {pid}");
        }
    }
}

#[async_trait]
impl BrowserControl for DesktopBrowser {
    async fn close_all(&self) -> Result<usize, AutomationError> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let targets = self.targets(&system);
        if targets.is_empty() {
            debug!("No browser running");
            return Ok(0);
        }

        info!("Closing {} browser process(es)", targets.len());
        for pid in &targets {
            request_close(&system, *pid);
        }
        tokio::time::sleep(self.grace).await;

        system.refresh_processes(ProcessesToUpdate::Some(&targets), true);
        for pid in &targets {
            if let Some(process) = system.process(*pid) {
                warn!("Force killing {} ({pid})", process.name().to_string_lossy());
                process.kill();
            }
        }
        Ok(targets.len())
    }

    async fn launch(&self) -> Result<(), AutomationError> {
        info!("Launching browser {}", self.exe.display());
        std::process::Command::new(&self.exe)
            .spawn()
            .map(|_| ())
            .map_err(|e| AutomationError::io(&self.exe, e))
    }
}
