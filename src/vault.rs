use std::path::PathBuf;

use log::debug;

use crate::error::{NoteError, Result};

/// File-store capability supplied by the hosting environment. Paths are
/// vault-relative, forward-slash separated.
pub trait Vault: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn create_folder(&self, path: &str) -> Result<()>;
    /// Create a new file. Fails if the path already exists.
    fn create(&self, path: &str, content: &str) -> Result<()>;
    fn read(&self, path: &str) -> Result<String>;
}

/// Vault backed by a directory on the local filesystem.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsVault { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Vault for FsVault {
    fn exists(&self, path: &str) -> bool {
        self.full_path(path).exists()
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        let full = self.full_path(path);
        std::fs::create_dir_all(&full).map_err(|e| NoteError::Write(format!("{}: {e}", full.display())))?;
        debug!("Created folder {}", full.display());
        Ok(())
    }

    fn create(&self, path: &str, content: &str) -> Result<()> {
        let full = self.full_path(path);
        // create_new is the only collision protection; the vault has no locking
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        use std::io::Write as _;
        let mut file = options
            .open(&full)
            .map_err(|e| NoteError::Write(format!("{}: {e}", full.display())))?;
        file.write_all(content.as_bytes())
            .map_err(|e| NoteError::Write(format!("{}: {e}", full.display())))?;
        debug!("Created note {}", full.display());
        Ok(())
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.full_path(path);
        std::fs::read_to_string(&full).map_err(|e| NoteError::Template(format!("{}: {e}", full.display())))
    }
}
