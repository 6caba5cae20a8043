//! Clock and file-system seams used during task execution

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// File operations needed by tasks and the build log
pub trait FileSystem: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    fn copy_file(&self, source: &Path, destination: &Path) -> std::io::Result<()>;

    fn move_file(&self, source: &Path, destination: &Path) -> std::io::Result<()>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;

    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// File system backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    fn ensure_parent(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl FileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn copy_file(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        Self::ensure_parent(destination)?;
        std::fs::copy(source, destination).map(|_| ())
    }

    fn move_file(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        Self::ensure_parent(destination)?;
        std::fs::rename(source, destination)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        Self::ensure_parent(path)?;
        std::fs::write(path, contents)
    }

    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory file system (for testing or dry runs)
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every stored file, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn not_found(path: &Path) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
    }
}

impl FileSystem for InMemoryFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn copy_file(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        let mut files = self.files.lock();
        let contents = files.get(source).cloned().ok_or_else(|| Self::not_found(source))?;
        files.insert(destination.to_path_buf(), contents);
        Ok(())
    }

    fn move_file(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        let mut files = self.files.lock();
        let contents = files.remove(source).ok_or_else(|| Self::not_found(source))?;
        files.insert(destination.to_path_buf(), contents);
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        self.files.lock().insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }
}
