//! Self-update from a remote version marker and archive.

use crate::config::UpdateConfig;
use crate::errors::AutomationError;
use serde::Serialize;
use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
const MARKER_SCAN_LINES: usize = 30;
const MARKER_TIMEOUT: Duration = Duration::from_secs(10);
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UpdateStatus {
    Disabled,
    /// Checked less than one interval ago.
    NotDue,
    /// The marker could not be fetched or parsed.
    Unavailable,
    UpToDate { version: String },
    Installed { from: String, to: String, files: usize },
}

/// Extracts the version from a marker body: either a bare version string or
/// a `VERSION = "x"` line near the top of a file.
pub fn parse_version_marker(text: &str) -> Option<String> {
    for line in text.lines().take(MARKER_SCAN_LINES) {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("VERSION") {
            let Some(value) = rest.trim_start().strip_prefix('=') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    let trimmed = text.trim();
    if !trimmed.is_empty() && !trimmed.contains(char::is_whitespace) {
        return Some(trimmed.trim_start_matches('v').to_string());
    }
    None
}

fn is_excluded(rel: &Path, exclude: &[String]) -> bool {
    exclude.iter().any(|ex| rel.starts_with(Path::new(ex)))
}

/// Single top-level folder shared by every entry, if there is one.
fn common_root<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Option<PathBuf> {
    let mut root: Option<PathBuf> = None;
    for name in archive.file_names() {
        let first = Path::new(name).components().next()?;
        let first = PathBuf::from(first.as_os_str());
        match &root {
            None => root = Some(first),
            Some(r) if *r == first => {}
            Some(_) => return None,
        }
    }
    // A lone file at the top is not a folder to strip.
    let root = root?;
    archive
        .file_names()
        .any(|n| Path::new(n).components().count() > 1)
        .then_some(root)
}

/// Unpacks `bytes` into `dest`, stripping the archive's top-level folder.
///
/// Entries matching `exclude` (relative to `dest`) and entries that would land
/// outside `dest` are skipped. Returns the relative paths of written files.
pub fn extract_archive(
    bytes: &[u8],
    dest: &Path,
    exclude: &[String],
) -> Result<Vec<PathBuf>, AutomationError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AutomationError::Update(format!("invalid archive: {e}")))?;
    let root = common_root(&archive);

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AutomationError::Update(format!("bad archive entry {i}: {e}")))?;

        let Some(enclosed) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let rel = match &root {
            Some(root) => match enclosed.strip_prefix(root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            },
            None => enclosed,
        };
        let normal = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if rel.as_os_str().is_empty() || !normal {
            continue;
        }
        if is_excluded(&rel, exclude) {
            info!("Skipping excluded {}", rel.display());
            continue;
        }

        let target = dest.join(&rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| AutomationError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AutomationError::io(parent, e))?;
        }
        let mut out = std::fs::File::create(&target).map_err(|e| AutomationError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| AutomationError::io(&target, e))?;
        debug!("Updated {}", rel.display());
        written.push(rel);
    }
    Ok(written)
}

/// Running executable moved aside so the archive can replace it.
struct ExeBackup {
    exe: PathBuf,
    backup: PathBuf,
}

impl ExeBackup {
    /// Only backs up when the executable lives inside `install_dir`.
    fn take(install_dir: &Path) -> Option<Self> {
        let exe = std::env::current_exe().ok()?;
        if !exe.starts_with(install_dir) {
            return None;
        }
        let mut backup = exe.clone().into_os_string();
        backup.push(".backup");
        let backup = PathBuf::from(backup);
        let _ = std::fs::remove_file(&backup);
        // Renaming works on a running image where overwriting does not.
        match std::fs::rename(&exe, &backup) {
            Ok(()) => {
                info!("Backed up {}", backup.display());
                Some(Self { exe, backup })
            }
            Err(e) => {
                warn!("Could not back up {}: {e}", exe.display());
                None
            }
        }
    }

    /// Puts the old executable back if the update did not ship a new one.
    fn restore_if_missing(&self) {
        if self.exe.exists() {
            return;
        }
        if let Err(e) = std::fs::copy(&self.backup, &self.exe) {
            warn!("Could not restore {}: {e}", self.exe.display());
        }
    }
}

pub struct Updater {
    http: reqwest::Client,
    config: UpdateConfig,
    install_dir: PathBuf,
    current_version: String,
    last_check: Mutex<Option<Instant>>,
}

impl Updater {
    pub fn new(config: UpdateConfig, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            install_dir: install_dir.into(),
            current_version: VERSION.to_string(),
            last_check: Mutex::new(None),
        }
    }

    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    /// Claims the check slot if the interval has passed since the last one.
    fn claim_check(&self) -> bool {
        let mut last = self.last_check.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.config.check_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    #[instrument(skip(self))]
    pub async fn check(&self) -> Result<UpdateStatus, AutomationError> {
        let (Some(version_url), Some(archive_url)) =
            (&self.config.version_url, &self.config.archive_url)
        else {
            debug!("No update source configured");
            return Ok(UpdateStatus::Disabled);
        };
        if !self.claim_check() {
            return Ok(UpdateStatus::NotDue);
        }

        info!("Checking for updates...");
        let Some(remote) = self.remote_version(version_url).await else {
            warn!("Could not read the remote version");
            return Ok(UpdateStatus::Unavailable);
        };
        info!("Current version: {}, latest: {remote}", self.current_version);
        if remote == self.current_version {
            return Ok(UpdateStatus::UpToDate { version: remote });
        }

        info!("New version found: {} -> {remote}", self.current_version);
        let bytes = self.download(archive_url).await?;
        let backup = ExeBackup::take(&self.install_dir);
        let result = extract_archive(&bytes, &self.install_dir, &self.config.exclude);
        if let Some(backup) = &backup {
            backup.restore_if_missing();
        }
        let files = result?;
        info!("Update installed ({} files)", files.len());

        Ok(UpdateStatus::Installed {
            from: self.current_version.clone(),
            to: remote,
            files: files.len(),
        })
    }

    async fn remote_version(&self, url: &str) -> Option<String> {
        let resp = self.http.get(url).timeout(MARKER_TIMEOUT).send().await.ok()?;
        if !resp.status().is_success() {
            debug!("Version marker returned HTTP {}", resp.status());
            return None;
        }
        let text = resp.text().await.ok()?;
        parse_version_marker(&text)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AutomationError> {
        info!("Downloading {url}");
        let resp = self
            .http
            .get(url)
            .timeout(ARCHIVE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AutomationError::Update(format!("download failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AutomationError::Update(format!(
                "archive download returned HTTP {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AutomationError::Update(format!("download interrupted: {e}")))?;
        Ok(bytes.to_vec())
    }
}
