//! Runtime configuration and the install-layout auto-detection.
//!
//! Expected layout on an operator machine:
//!
//! ```text
//! <Documents>/<CHANNEL>/
//! ├── upload-<SPREADSHEET>/   <- install dir (this binary, icon/, creds.json)
//! └── <CHANNEL>.exe           <- the browser for this channel
//! ```

use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_SPREADSHEET: &str = "AYS2";
pub const DEFAULT_SERVER_ROOT: &str = r"\\tsclient\D\AUTO\done";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.youtube.com/upload";
pub const DEFAULT_LOG_FILE: &str = "upload.log";
pub const CREDENTIAL_FILE: &str = "creds.json";
pub const TEMPLATE_DIR: &str = "icon";

/// Randomised ranges for every pause and budget the operator loop uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    pub tiny: Range<f64>,
    pub small: Range<f64>,
    pub medium: Range<f64>,
    pub long: Range<f64>,
    pub mouse_travel: Range<f64>,
    pub screen_retry_interval: Range<f64>,
    pub browser_launch_wait_secs: Range<f64>,
    pub click_timeout_secs: Range<f64>,
    pub click_confidence: Range<f32>,
    pub step2_load_timeout_secs: Range<f64>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tiny: 0.5..0.9,
            small: 1.2..2.0,
            medium: 2.5..4.0,
            long: 5.0..8.0,
            mouse_travel: 0.25..0.45,
            screen_retry_interval: 1.2..2.0,
            browser_launch_wait_secs: 12.0..20.0,
            click_timeout_secs: 120.0..180.0,
            click_confidence: 0.70..0.90,
            step2_load_timeout_secs: 150.0..240.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// URL of the remote version marker. Updates are disabled when unset.
    pub version_url: Option<String>,
    /// URL of the archive extracted over the install directory.
    pub archive_url: Option<String>,
    /// Paths relative to the install directory that an update never overwrites.
    pub exclude: Vec<String>,
    pub check_interval: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            version_url: None,
            archive_url: None,
            exclude: vec![CREDENTIAL_FILE.to_string(), DEFAULT_LOG_FILE.to_string()],
            check_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl UpdateConfig {
    pub fn is_enabled(&self) -> bool {
        self.version_url.is_some() && self.archive_url.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub channel_code: String,
    pub browser_exe: PathBuf,
    pub spreadsheet_name: String,
    /// Skips the by-name lookup when set.
    pub spreadsheet_id: Option<String>,
    pub local_root: PathBuf,
    pub server_root: PathBuf,
    pub install_dir: PathBuf,
    pub template_dir: PathBuf,
    pub credential_path: PathBuf,
    pub log_file: String,
    pub upload_url: String,
    pub delete_server_after_copy: bool,
    pub timing: Timing,
    pub update: UpdateConfig,
}

impl Config {
    /// Derives a configuration from where the install directory sits.
    pub fn detect(install_dir: &Path) -> Result<Self, AutomationError> {
        let parent = install_dir.parent().ok_or_else(|| {
            AutomationError::Config(format!(
                "install dir {} has no parent directory",
                install_dir.display()
            ))
        })?;

        let browser_exe = find_browser_exe(parent)?;
        let channel_code = browser_exe
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                AutomationError::Config(format!(
                    "cannot derive channel from {}",
                    browser_exe.display()
                ))
            })?;

        let folder_name = install_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let spreadsheet_name = spreadsheet_from_folder(&folder_name);

        let home = std::env::var_os("USERPROFILE")
            .or_else(|| std::env::var_os("HOME"))
            .map(PathBuf::from)
            .ok_or_else(|| AutomationError::Config("cannot resolve home directory".to_string()))?;
        let local_root = home.join("Desktop").join("DONE");
        std::fs::create_dir_all(&local_root).map_err(|e| AutomationError::io(&local_root, e))?;

        let config = Self::with_roots(
            channel_code,
            browser_exe,
            spreadsheet_name,
            local_root,
            PathBuf::from(DEFAULT_SERVER_ROOT),
            install_dir.to_path_buf(),
        );

        info!("Config detected:");
        info!("   CHANNEL_CODE: {}", config.channel_code);
        info!("   BROWSER: {}", config.browser_exe.display());
        info!("   SPREADSHEET: {}", config.spreadsheet_name);
        info!("   LOCAL_DONE: {}", config.local_root.display());

        Ok(config)
    }

    /// Builds a configuration from explicit paths with every other field defaulted.
    pub fn with_roots(
        channel_code: impl Into<String>,
        browser_exe: impl Into<PathBuf>,
        spreadsheet_name: impl Into<String>,
        local_root: impl Into<PathBuf>,
        server_root: impl Into<PathBuf>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        let install_dir = install_dir.into();
        Self {
            channel_code: channel_code.into(),
            browser_exe: browser_exe.into(),
            spreadsheet_name: spreadsheet_name.into(),
            spreadsheet_id: None,
            local_root: local_root.into(),
            server_root: server_root.into(),
            template_dir: install_dir.join(TEMPLATE_DIR),
            credential_path: install_dir.join(CREDENTIAL_FILE),
            install_dir,
            log_file: DEFAULT_LOG_FILE.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            delete_server_after_copy: true,
            timing: Timing::default(),
            update: UpdateConfig::default(),
        }
    }
}

fn find_browser_exe(dir: &Path) -> Result<PathBuf, AutomationError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AutomationError::io(dir, e))?;
    let mut exes: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("exe"))
                    .unwrap_or(false)
        })
        .collect();
    // read_dir order is platform dependent
    exes.sort();
    exes.into_iter().next().ok_or_else(|| {
        AutomationError::Config(format!("no .exe found in {}", dir.display()))
    })
}

pub(crate) fn spreadsheet_from_folder(folder_name: &str) -> String {
    match folder_name.strip_prefix("upload-") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_SPREADSHEET.to_string(),
    }
}
