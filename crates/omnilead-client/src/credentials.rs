//! Durable storage for the access credential.
//!
//! The token is the only client state that survives a restart. It lives in
//! a plain file under the platform data directory and is removed on logout
//! and on any authentication-rejected response.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CredentialError {
    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CredentialError>;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Open the store under `data_dir`, or under the platform default
    /// (`ProjectDirs` for "omnilead") when `None`.
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("com", "omnilead", "omnilead")
                .ok_or(CredentialError::NoDataDir)?
                .data_dir()
                .to_path_buf(),
        };
        fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join("credential"),
        })
    }

    /// Read the persisted credential, if any.
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(token) => {
                let token = token.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, token: &str) -> Result<()> {
        fs::write(&self.path, token)?;
        debug!(path = %self.path.display(), "Credential persisted");
        Ok(())
    }

    /// Remove the persisted credential. Idempotent.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Credential cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(Some(dir.path().to_path_buf())).unwrap();
        (dir, store)
    }

    #[test]
    fn round_trip() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), None);

        store.save("T1").unwrap();
        assert_eq!(store.load().unwrap(), Some("T1".to_string()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = store();
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn whitespace_only_file_counts_as_absent() {
        let (_dir, store) = store();
        store.save("  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
