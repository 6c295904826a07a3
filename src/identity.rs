use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};
use uuid::Uuid;

/// Stable anonymous user identifier attached to submitted jobs.
pub trait IdentityStore: Send + Sync {
    fn get(&self) -> Result<Option<String>>;

    fn set(&self, user_id: &str) -> Result<()>;

    /// Read the id, creating and persisting a fresh one if none exists yet.
    fn get_or_create(&self) -> Result<String> {
        if let Some(existing) = self.get()? {
            return Ok(existing);
        }
        let user_id = Uuid::new_v4().to_string();
        self.set(&user_id)?;
        log::info!("Created anonymous user id {}", user_id);
        Ok(user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Profile {
    id: Option<String>,
}

/// Identity kept in a small JSON document on disk.
pub struct FileIdentityStore {
    path: PathBuf,
    data: RwLock<Profile>,
}

impl FileIdentityStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read identity from {}", path.display()))?;
            // A corrupt profile only costs the user their history; start over.
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Profile::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &Profile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create identity directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write identity to {}", self.path.display()))
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> Result<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow!("identity store lock poisoned"))?;
        Ok(guard.id.clone())
    }

    fn set(&self, user_id: &str) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("identity store lock poisoned"))?;
        guard.id = Some(user_id.to_string());
        self.persist(&guard)
    }
}

/// Identity that lives only as long as the process.
#[derive(Default)]
pub struct MemoryIdentityStore {
    id: RwLock<Option<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(user_id: impl Into<String>) -> Self {
        Self {
            id: RwLock::new(Some(user_id.into())),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> Result<Option<String>> {
        self.id
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("identity store lock poisoned"))
    }

    fn set(&self, user_id: &str) -> Result<()> {
        let mut guard = self
            .id
            .write()
            .map_err(|_| anyhow!("identity store lock poisoned"))?;
        *guard = Some(user_id.to_string());
        Ok(())
    }
}
