//! Makes sure a job's media folder exists locally before the workflow starts.

use crate::errors::AutomationError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

pub const VIDEO_EXTS: &[&str] = &["mp4"];
pub const SUBTITLE_EXTS: &[&str] = &["srt"];
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    extension_of(path)
        .map(|ext| exts.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn is_required_kind(path: &Path) -> bool {
    has_ext(path, VIDEO_EXTS) || has_ext(path, SUBTITLE_EXTS) || has_ext(path, IMAGE_EXTS)
}

/// At least one video, one subtitle and one image directly inside `dir`.
pub fn has_required_files(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let (mut video, mut subtitle, mut image) = (false, false, false);
    for entry in entries.flatten() {
        let path = entry.path();
        video |= has_ext(&path, VIDEO_EXTS);
        subtitle |= has_ext(&path, SUBTITLE_EXTS);
        image |= has_ext(&path, IMAGE_EXTS);
    }
    video && subtitle && image
}

/// `(count, total bytes)` of required-kind files anywhere under `dir`.
pub fn required_stats(dir: &Path) -> (u64, u64) {
    if !dir.is_dir() {
        return (0, 0);
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_required_kind(e.path()))
        .filter_map(|e| e.metadata().ok())
        .fold((0, 0), |(count, bytes), meta| (count + 1, bytes + meta.len()))
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), AutomationError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            AutomationError::io(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AutomationError::InvalidArgument(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| AutomationError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| AutomationError::io(entry.path(), e))?;
        }
    }
    Ok(())
}

/// What `ensure_local` did to make the folder ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Local and server copies match.
    AlreadyStaged,
    /// Local is complete and the server has nothing; local is authoritative.
    LocalOnly,
    /// Copied from the server.
    Copied { server_deleted: bool },
}

#[derive(Debug, Clone)]
pub struct FileStager {
    local_root: PathBuf,
    server_root: PathBuf,
    delete_server: bool,
}

impl FileStager {
    pub fn new(local_root: impl Into<PathBuf>, server_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            server_root: server_root.into(),
            delete_server: true,
        }
    }

    pub fn delete_server_after_copy(mut self, delete: bool) -> Self {
        self.delete_server = delete;
        self
    }

    pub fn local_folder(&self, code: &str) -> PathBuf {
        self.local_root.join(code)
    }

    pub fn server_folder(&self, code: &str) -> PathBuf {
        self.server_root.join(code)
    }

    /// Complete media present on either side.
    pub fn has_media(&self, code: &str) -> bool {
        has_required_files(&self.local_folder(code))
            || has_required_files(&self.server_folder(code))
    }

    #[instrument(skip(self))]
    pub fn ensure_local(&self, code: &str) -> Result<StageOutcome, AutomationError> {
        let local = self.local_folder(code);
        let server = self.server_folder(code);

        let local_ok = has_required_files(&local);
        let server_ok = has_required_files(&server);

        if local_ok {
            if !server_ok {
                info!("Local complete, nothing on server: {}", local.display());
                return Ok(StageOutcome::LocalOnly);
            }
            if required_stats(&local) == required_stats(&server) {
                info!("Local complete: {}", local.display());
                return Ok(StageOutcome::AlreadyStaged);
            }
            info!("Local differs from server, refreshing {}", local.display());
        }

        if !server_ok {
            error!("Server folder incomplete: {}", server.display());
            return Err(AutomationError::MissingMedia {
                code: code.to_string(),
                path: server,
            });
        }

        if local.exists() {
            if let Err(e) = fs::remove_dir_all(&local) {
                warn!("Could not clear {}: {e}", local.display());
            }
        }
        copy_dir_recursive(&server, &local)?;
        info!("Copied {} -> {}", server.display(), local.display());

        if !has_required_files(&local) {
            error!("Still incomplete after copy: {}", local.display());
            return Err(AutomationError::MissingMedia {
                code: code.to_string(),
                path: local,
            });
        }

        let mut server_deleted = false;
        if self.delete_server {
            match fs::remove_dir_all(&server) {
                Ok(()) => {
                    info!("Deleted server copy: {}", server.display());
                    server_deleted = true;
                }
                Err(e) => warn!("Could not delete server copy {}: {e}", server.display()),
            }
        }

        Ok(StageOutcome::Copied { server_deleted })
    }

    /// Stages every code, logging failures. Returns the codes that are ready.
    pub fn stage_all(&self, codes: &[String]) -> Vec<String> {
        codes
            .iter()
            .filter(|code| match self.ensure_local(code) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Staging {code} failed: {e}");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Deletes local folders of jobs already posted. Failures are warnings.
    pub fn purge_local(&self, codes: &[String]) -> usize {
        let mut removed = 0;
        for code in codes {
            let folder = self.local_folder(code);
            if !folder.is_dir() {
                continue;
            }
            match fs::remove_dir_all(&folder) {
                Ok(()) => {
                    info!("Deleted: {}", folder.display());
                    removed += 1;
                }
                Err(e) => warn!("Could not delete {}: {e}", folder.display()),
            }
        }
        removed
    }
}
