//! Working-directory staging.
//!
//! Concurrent tests must never share the provisioning engine's local state,
//! so each test copies the infrastructure definition folder it exercises
//! into its own temp directory and hands that copy to its session. Engine
//! state (`.terraform/`, `*.tfstate*`) from previous local runs is not
//! carried along.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkdirError {
    #[error("'{}' does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to stage '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A private copy of an infrastructure definition folder.
///
/// The backing temp directory is deleted when this is dropped, which is
/// safe because the session's destroy runs before the guard holding the
/// staged dir goes out of scope in the usual `scoped(session)` pattern.
#[derive(Debug)]
pub struct StagedWorkdir {
    root: PathBuf,
    // Keeps the temp directory alive for as long as the copy is in use.
    _dir: TempDir,
}

impl StagedWorkdir {
    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// Copy `source` into a fresh temp directory, skipping local engine state.
///
/// Skipped: `.terraform/` and `.git/` trees, and any `*.tfstate*` file.
pub fn copy_to_temp(source: impl AsRef<Path>) -> Result<StagedWorkdir, WorkdirError> {
    let source = source.as_ref();
    if !source.is_dir() {
        return Err(WorkdirError::NotADirectory(source.to_path_buf()));
    }

    let dir = TempDir::new().map_err(|e| io_error(source, e))?;
    let name = source
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("workdir"));
    let root = dir.path().join(name);

    copy_tree(source, &root)?;
    tracing::debug!(
        source = %source.display(),
        staged = %root.display(),
        "staged infrastructure definitions"
    );

    Ok(StagedWorkdir { root, _dir: dir })
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), WorkdirError> {
    fs::create_dir_all(dest).map_err(|e| io_error(dest, e))?;

    let entries = fs::read_dir(source).map_err(|e| io_error(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_error(source, e))?;
        let path = entry.path();
        let name = entry.file_name();

        if is_engine_state(&name) {
            continue;
        }

        let target = dest.join(&name);
        let file_type = entry.file_type().map_err(|e| io_error(&path, e))?;
        if file_type.is_dir() {
            copy_tree(&path, &target)?;
        } else if file_type.is_file() {
            fs::copy(&path, &target).map_err(|e| io_error(&path, e))?;
        }
        // Symlinks are skipped: definitions are plain files, and a link
        // escaping the source tree must not leak into the copy.
    }
    Ok(())
}

fn is_engine_state(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name == ".terraform" || name == ".git" || name.contains(".tfstate")
}

fn io_error(path: &Path, source: std::io::Error) -> WorkdirError {
    WorkdirError::Io {
        path: path.to_path_buf(),
        source,
    }
}
