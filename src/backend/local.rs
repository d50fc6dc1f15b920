//! Local disk backend

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::{DataFile, StorageBackend};

/// Backend over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Data file opened in append mode.
#[derive(Debug)]
struct LocalDataFile {
    file: File,
}

impl DataFile for LocalDataFile {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        // O_APPEND writes follow the new end of file
        self.file.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl StorageBackend for LocalBackend {
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn DataFile>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Box::new(LocalDataFile { file }))
    }

    fn write_synced(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_truncate_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        let backend = LocalBackend::new();

        let mut file = backend.open_append(&path).unwrap();
        file.append(b"first\nsecond\n").unwrap();
        file.truncate(6).unwrap();
        file.append(b"third\n").unwrap();
        file.sync().unwrap();

        assert_eq!(file.len().unwrap(), 12);
        assert_eq!(fs::read(&path).unwrap(), b"first\nthird\n");
    }

    #[test]
    fn test_reopen_appends_at_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        let backend = LocalBackend::new();

        backend.open_append(&path).unwrap().append(b"a\n").unwrap();
        let mut file = backend.open_append(&path).unwrap();
        assert_eq!(file.len().unwrap(), 2);
        file.append(b"b\n").unwrap();

        assert_eq!(backend.read(&path).unwrap(), b"a\nb\n");
    }

    #[test]
    fn test_list_only_files() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        backend.write_synced(&temp_dir.path().join("b"), b"").unwrap();
        backend.write_synced(&temp_dir.path().join("a"), b"").unwrap();

        assert_eq!(backend.list(temp_dir.path()).unwrap(), vec!["a", "b"]);
        assert!(backend.list(&temp_dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_write_synced_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");
        let backend = LocalBackend::new();

        backend.write_synced(&path, b"longer content").unwrap();
        backend.write_synced(&path, b"short").unwrap();
        assert_eq!(backend.read(&path).unwrap(), b"short");
        assert_eq!(backend.file_len(&path).unwrap(), 5);
    }
}
