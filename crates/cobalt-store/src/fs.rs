//! The process-wide file system is an injected capability, not a global
//! singleton, so store tests can run against an in-memory double.

use std::io;
use std::path::Path;

/// File-system operations the store needs. Management operations
/// (`make_directory`, `list_files`, `delete`, `file_size`, `rename`) are
/// kept separate from the content operations (`append`, `read`) the store
/// uses to write and parse records.
pub trait FileSystem: Send + Sync {
    fn make_directory(&self, path: &Path) -> io::Result<()>;
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;
    fn delete(&self, path: &Path) -> io::Result<()>;
    fn file_size(&self, path: &Path) -> io::Result<u64>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn append(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Overwrites `path` with exactly `data`, creating it if absent.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Thin wrapper over `std::fs`, the production implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixFileSystem;

impl FileSystem for PosixFileSystem {
    fn make_directory(&self, path: &Path) -> io::Result<()> {
        match std::fs::create_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn append(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(data)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}
