//! Actions run on a data file once it has been rotated out
//!
//! The file is closed and flushed before any action runs. A failing action is
//! reported as a storage error from the write that triggered the rotation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::backend::StorageBackend;

/// Post-rotation hook.
pub trait RotationAction: Send + Sync + fmt::Debug {
    /// Run against the closed file at `file`
    fn execute(&self, backend: &dyn StorageBackend, file: &Path) -> io::Result<()>;
}

/// Moves rotated files into another directory, keeping their names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveFileAction {
    destination: PathBuf,
}

impl MoveFileAction {
    /// Move rotated files into `destination` (created on demand)
    pub fn to_destination(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Destination directory
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl RotationAction for MoveFileAction {
    fn execute(&self, backend: &dyn StorageBackend, file: &Path) -> io::Result<()> {
        let name = file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("rotated path has no file name: {}", file.display()),
            )
        })?;
        backend.create_dir_all(&self.destination)?;
        backend.rename(file, &self.destination.join(name))?;

        backend.sync_dir(&self.destination)?;
        match file.parent() {
            Some(source) if source != self.destination.as_path() => backend.sync_dir(source),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_move_keeps_file_name() {
        let backend = MemoryBackend::new();
        let src = Path::new("/out/orders-0-0-1.txt");
        {
            let mut file = backend.open_append(src).unwrap();
            file.append(b"data\n").unwrap();
            file.sync().unwrap();
        }

        MoveFileAction::to_destination("/done").execute(&backend, src).unwrap();

        assert!(!backend.exists(src));
        assert_eq!(
            backend.read(Path::new("/done/orders-0-0-1.txt")).unwrap(),
            b"data\n"
        );
    }

    #[test]
    fn test_move_syncs_both_directories() {
        let backend = MemoryBackend::new();
        backend.put("/out/orders-0-0-1.txt", b"data\n");

        MoveFileAction::to_destination("/done")
            .execute(&backend, Path::new("/out/orders-0-0-1.txt"))
            .unwrap();

        assert_eq!(backend.dir_syncs(Path::new("/done")), 1);
        assert_eq!(backend.dir_syncs(Path::new("/out")), 1);
    }

    #[test]
    fn test_move_missing_file_fails() {
        let backend = MemoryBackend::new();
        let err = MoveFileAction::to_destination("/done")
            .execute(&backend, Path::new("/out/nope.txt"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
