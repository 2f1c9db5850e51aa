//! Atomic, idempotent file writes.
//!
//! Content is staged in a temporary file next to the target, synced, given
//! its final mode and renamed over the target. Readers see either the old or
//! the new file, never a partial one. Targets whose content already matches
//! are left untouched so their modification time does not move.

use crate::error::WriteError;
use crate::render::RenderedFile;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Default mode for directories created on demand.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Writes rendered files to disk.
#[derive(Debug, Clone)]
pub struct FileMaterializer {
    dir_mode: u32,
}

impl Default for FileMaterializer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileMaterializer {
    /// Create a materializer that creates missing parents with mode 0755.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dir_mode: DEFAULT_DIR_MODE,
        }
    }

    /// Set the mode for created parent directories.
    #[must_use]
    pub const fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Write `file` if its content differs from what is on disk.
    ///
    /// Returns `true` when the target was replaced. When the content already
    /// matches but the mode does not, the mode is corrected in place and
    /// `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] classified from the underlying I/O error. The
    /// previous content of the target is left intact.
    pub fn write(&self, file: &RenderedFile) -> Result<bool, WriteError> {
        match self.stage(file)? {
            Some(staged) => {
                staged.commit()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stage `file` without touching the target.
    ///
    /// Returns `None` when the target already holds the same content; its
    /// mode is reconciled in that case. Dropping the returned [`StagedFile`]
    /// without committing removes the temporary file.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] if the parent directory or temporary file
    /// cannot be created or written.
    pub fn stage(&self, file: &RenderedFile) -> Result<Option<StagedFile>, WriteError> {
        let target = &file.path;
        let fail = |e| WriteError::from_io(target, e);

        if content_matches(target, &file.content) {
            reconcile_mode(target, file.mode).map_err(fail)?;
            debug!(path = %target.display(), "Content unchanged");
            return Ok(None);
        }

        let dir = parent_dir(target);
        self.ensure_dir(dir).map_err(fail)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&temp_prefix(target))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(fail)?;
        temp.write_all(&file.content).map_err(fail)?;
        temp.as_file().sync_all().map_err(fail)?;
        set_mode(temp.path(), file.mode).map_err(fail)?;

        Ok(Some(StagedFile {
            temp,
            target: target.clone(),
        }))
    }

    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        if dir.is_dir() {
            return Ok(());
        }
        create_dir_all(dir, self.dir_mode)
    }
}

/// Content written to a temporary file, not yet visible at the target.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Path of the temporary file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the staged content over the target.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] if the rename fails; the temporary file is
    /// removed in that case.
    pub fn commit(self) -> Result<(), WriteError> {
        let Self { temp, target } = self;
        temp.persist(&target)
            .map_err(|e| WriteError::from_io(&target, e.error))?;
        Ok(())
    }
}

/// Whether `path` exists and its SHA-256 matches `content`.
///
/// Unreadable targets are treated as different so a rewrite is attempted.
#[must_use]
pub fn content_matches(path: &Path, content: &[u8]) -> bool {
    file_digest(path).is_ok_and(|digest| digest == Sha256::digest(content).as_slice())
}

fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn temp_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map_or_else(|| "secret".into(), |n| n.to_string_lossy());
    format!(".{name}.")
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn reconcile_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let current = fs::metadata(path)?.permissions().mode() & 0o7777;
    if current == mode {
        return Ok(());
    }
    debug!(
        path = %path.display(),
        from = %format_args!("{current:o}"),
        to = %format_args!("{mode:o}"),
        "Correcting file mode"
    );
    set_mode(path, mode)
}

#[cfg(not(unix))]
fn reconcile_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_dir_all(dir: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(mode).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(dir)
}
