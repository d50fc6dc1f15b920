//! In-memory backend with crash simulation and fault injection
//!
//! Every file keeps two images: the live bytes and the bytes as of the last
//! sync. [`MemoryBackend::simulate_crash`] throws the live image away, which
//! models losing the page cache on an abrupt process or machine failure.
//! A file created by `open_append` also loses its directory entry in a crash
//! unless its directory was synced after the create. Renames and whole-file
//! synced writes are durable as soon as they return.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DataFile, StorageBackend};

/// Operations that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Open,
    Append,
    Truncate,
    Sync,
    Write,
    Rename,
    SyncDir,
}

#[derive(Debug, Clone, Default)]
struct MemFile {
    live: Vec<u8>,
    durable: Vec<u8>,
    entry_synced: bool,
}

impl MemFile {
    fn synced(data: &[u8]) -> Self {
        Self {
            live: data.to_vec(),
            durable: data.to_vec(),
            entry_synced: true,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, MemFile>,
    faults: HashSet<FaultOp>,
    dir_syncs: BTreeMap<PathBuf, usize>,
}

impl MemoryState {
    fn take_fault(&mut self, op: FaultOp) -> io::Result<()> {
        if self.faults.remove(&op) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected {:?} failure", op),
            ));
        }
        Ok(())
    }

    fn file_mut(&mut self, path: &Path) -> io::Result<&mut MemFile> {
        self.files.get_mut(path).ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

/// Shared in-memory store. Clones see the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` fail with an I/O error
    pub fn fail_next(&self, op: FaultOp) {
        self.state().faults.insert(op);
    }

    /// Drop every byte that was not synced, and every created file whose
    /// directory was not synced
    pub fn simulate_crash(&self) {
        let mut state = self.state();
        state.files.retain(|_, file| file.entry_synced);
        for file in state.files.values_mut() {
            file.live = file.durable.clone();
        }
    }

    /// Number of successful `sync_dir` calls on `dir`
    pub fn dir_syncs(&self, dir: &Path) -> usize {
        self.state().dir_syncs.get(dir).copied().unwrap_or(0)
    }

    /// Synced content of a file
    pub fn durable_contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.state().files.get(path).map(|f| f.durable.clone())
    }

    /// Paths of every stored file, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state().files.keys().cloned().collect()
    }

    /// Overwrite a file's live and durable content
    pub fn put(&self, path: impl Into<PathBuf>, data: &[u8]) {
        self.state().files.insert(path.into(), MemFile::synced(data));
    }
}

#[derive(Debug)]
struct MemDataFile {
    backend: MemoryBackend,
    path: PathBuf,
}

impl DataFile for MemDataFile {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.backend.state();
        state.take_fault(FaultOp::Append)?;
        state.file_mut(&self.path)?.live.extend_from_slice(data);
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let mut state = self.backend.state();
        state.take_fault(FaultOp::Truncate)?;
        state.file_mut(&self.path)?.live.resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let mut state = self.backend.state();
        state.take_fault(FaultOp::Sync)?;
        let file = state.file_mut(&self.path)?;
        file.durable = file.live.clone();
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        let mut state = self.backend.state();
        Ok(state.file_mut(&self.path)?.live.len() as u64)
    }
}

impl StorageBackend for MemoryBackend {
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn DataFile>> {
        let mut state = self.state();
        state.take_fault(FaultOp::Open)?;
        state.files.entry(path.to_path_buf()).or_default();
        Ok(Box::new(MemDataFile {
            backend: self.clone(),
            path: path.to_path_buf(),
        }))
    }

    fn write_synced(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        state.take_fault(FaultOp::Write)?;
        state.files.insert(path.to_path_buf(), MemFile::synced(data));
        Ok(())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut state = self.state();
        Ok(state.file_mut(path)?.live.clone())
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().files.contains_key(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .state()
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        let mut state = self.state();
        Ok(state.file_mut(path)?.live.len() as u64)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state();
        state.take_fault(FaultOp::Rename)?;
        let mut file = state.files.remove(from).ok_or_else(|| not_found(from))?;
        file.entry_synced = true;
        state.files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.state()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn create_dir_all(&self, _dir: &Path) -> io::Result<()> {
        Ok(())
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.state();
        state.take_fault(FaultOp::SyncDir)?;
        for (path, file) in state.files.iter_mut() {
            if path.parent() == Some(dir) {
                file.entry_synced = true;
            }
        }
        *state.dir_syncs.entry(dir.to_path_buf()).or_insert(0) += 1;
        Ok(())
    }
}
