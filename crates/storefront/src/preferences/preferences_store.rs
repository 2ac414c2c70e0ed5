use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use storefront_api::UserData;

use crate::storage::{Result, StorageError};

/// Durable document holding one `UserData`.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Returns the stored document, or the default when nothing was saved yet.
    async fn load(&self) -> Result<UserData>;

    /// Replaces the stored document. Either the whole document is written or
    /// the previous one stays in place.
    async fn save(&self, data: &UserData) -> Result<()>;
}

/// `UserData` as a pretty-printed JSON file, replaced atomically via a
/// sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct JsonFilePreferencesStore {
    path: PathBuf,
}

impl JsonFilePreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "preferences.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PreferencesStore for JsonFilePreferencesStore {
    async fn load(&self) -> Result<UserData> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let data = serde_json::from_slice(&bytes)?;
                debug!(
                    "[JsonFilePreferencesStore] Loaded preferences from {}",
                    self.path.display()
                );
                Ok(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "[JsonFilePreferencesStore] No preferences at {}, starting from defaults",
                    self.path.display()
                );
                Ok(UserData::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &UserData) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// Process-local store. Writes can be made to fail to exercise the
/// tracker's error path.
#[derive(Debug, Default)]
pub struct InMemoryPreferencesStore {
    data: Mutex<UserData>,
    fail_writes: AtomicBool,
}

impl InMemoryPreferencesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: UserData) -> Self {
        Self {
            data: Mutex::new(data),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved document.
    pub fn snapshot(&self) -> UserData {
        self.data
            .lock()
            .map(|data| data.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl PreferencesStore for InMemoryPreferencesStore {
    async fn load(&self) -> Result<UserData> {
        Ok(self.snapshot())
    }

    async fn save(&self, data: &UserData) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "preferences store rejected write",
            )));
        }
        let mut guard = self
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = data.clone();
        Ok(())
    }
}
