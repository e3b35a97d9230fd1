//! Filesystem primitives for documents and version storage
//!
//! Documents are written to a temp file in the destination directory and then
//! renamed into place. Directory trees are staged beside their destination and
//! swapped in wholesale, never merged into an existing tree.

use crate::error::{IoContext, LifecycleError, LifecycleResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;

/// Atomically replace `path` with `content`
pub fn write_atomic(path: &Path, content: &[u8]) -> LifecycleResult<()> {
    let parent = parent_dir(path)?;
    fs::create_dir_all(parent).at_path(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent).at_path(parent)?;
    temp_file.write_all(content).at_path(temp_file.path())?;
    temp_file.as_file().sync_all().at_path(temp_file.path())?;

    temp_file
        .persist(path)
        .map_err(|e| LifecycleError::io(path, e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> LifecycleResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())
}

/// A directory being assembled next to its final location
///
/// Dropping it without `commit` discards everything written so far.
#[derive(Debug)]
pub struct StagedDir {
    temp: TempDir,
    content: PathBuf,
}

impl StagedDir {
    /// Create a staging area in the same parent as `destination`
    pub fn beside(destination: &Path) -> LifecycleResult<Self> {
        let parent = parent_dir(destination)?;
        fs::create_dir_all(parent).at_path(parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .at_path(parent)?;
        let content = temp.path().join("content");
        fs::create_dir(&content).at_path(&content)?;
        Ok(Self { temp, content })
    }

    pub fn path(&self) -> &Path {
        &self.content
    }

    /// Swap the staged tree into `destination`, removing whatever was there
    pub fn commit(self, destination: &Path) -> LifecycleResult<()> {
        remove_dir_if_exists(destination)?;
        fs::rename(&self.content, destination).at_path(destination)?;
        drop(self.temp);
        Ok(())
    }
}

/// Recursively copy `src` into `dst` (created if missing)
pub fn copy_dir_all(src: &Path, dst: &Path) -> LifecycleResult<()> {
    if !src.is_dir() {
        return Err(LifecycleError::io(
            src,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source tree does not exist"),
        ));
    }

    fs::create_dir_all(dst).at_path(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            LifecycleError::io(path, e.into())
        })?;

        let rel_path = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| LifecycleError::Integrity(e.to_string()))?;
        let target = dst.join(rel_path);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).at_path(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).at_path(&target)?;
        }
    }

    Ok(())
}

/// Replace `dst` wholesale with a copy of `src`
pub fn replace_dir(src: &Path, dst: &Path) -> LifecycleResult<()> {
    let staged = StagedDir::beside(dst)?;
    copy_dir_all(src, staged.path())?;
    staged.commit(dst)
}

pub fn remove_dir_if_exists(path: &Path) -> LifecycleResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LifecycleError::io(path, e)),
    }
}

/// Copy a binary and mark the copy executable
pub fn copy_executable(src: &Path, dst: &Path) -> LifecycleResult<()> {
    let parent = parent_dir(dst)?;
    fs::create_dir_all(parent).at_path(parent)?;
    fs::copy(src, dst).at_path(dst)?;
    make_executable(dst)
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> LifecycleResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).at_path(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions).at_path(path)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> LifecycleResult<()> {
    Ok(())
}

/// Content digest of a directory tree: relative paths and file bytes, in sorted order
pub fn tree_digest(root: &Path) -> LifecycleResult<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| LifecycleError::io(root, e.into()))?;
        let rel_path = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| LifecycleError::Integrity(e.to_string()))?;
        let rel = rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_type = entry.file_type();
        if file_type.is_dir() {
            hasher.update(b"d:");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).at_path(entry.path())?;
            hasher.update(b"l:");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update(link.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        } else {
            let bytes = fs::read(entry.path()).at_path(entry.path())?;
            hasher.update(b"f:");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
    }

    Ok(format!("sha256:{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> LifecycleResult<()> {
    let link = fs::read_link(src).at_path(src)?;
    std::os::unix::fs::symlink(&link, dst).at_path(dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> LifecycleResult<()> {
    fs::copy(src, dst).at_path(dst)?;
    Ok(())
}

fn parent_dir(path: &Path) -> LifecycleResult<&Path> {
    path.parent().ok_or_else(|| {
        LifecycleError::Integrity(format!("path has no parent directory: {}", path.display()))
    })
}
