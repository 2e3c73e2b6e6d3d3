use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::UserId;

/// Well-known key the identity token is stored under.
pub const USER_ID_KEY: &str = "chatmate_user_id";

/// Key/value persistence behind the [`IdentityStore`], the native stand-in
/// for browser local storage.
pub trait IdentityBackend: Send + Sync {
    fn load(&self) -> Result<Option<UserId>, AppError>;
    fn save(&self, id: &UserId) -> Result<(), AppError>;
    fn remove(&self) -> Result<(), AppError>;
}

/// JSON file holding `{ "chatmate_user_id": "<token>" }`.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entries(&self) -> Result<HashMap<String, String>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(AppError::storage(self.path.display().to_string(), e)),
        };
        serde_json::from_str(&raw)
            .map_err(|e| AppError::storage(self.path.display().to_string(), e))
    }

    fn write_entries(&self, entries: &HashMap<String, String>) -> Result<(), AppError> {
        let path = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::storage(&path, e))?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|e| AppError::storage(&path, e))?;
        fs::write(&self.path, json).map_err(|e| AppError::storage(&path, e))
    }
}

impl IdentityBackend for FileIdentityStore {
    fn load(&self) -> Result<Option<UserId>, AppError> {
        Ok(self
            .read_entries()?
            .remove(USER_ID_KEY)
            .filter(|id| !id.trim().is_empty())
            .map(UserId::new))
    }

    fn save(&self, id: &UserId) -> Result<(), AppError> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(USER_ID_KEY.to_string(), id.as_str().to_string());
        self.write_entries(&entries)
    }

    fn remove(&self) -> Result<(), AppError> {
        let mut entries = self.read_entries()?;
        if entries.remove(USER_ID_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

/// Process-local backend, used in tests and when nothing should touch disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    value: Arc<Mutex<Option<UserId>>>,
}

impl MemoryIdentityStore {
    pub fn with_id(id: UserId) -> Self {
        Self { value: Arc::new(Mutex::new(Some(id))) }
    }

    pub fn stored(&self) -> Option<UserId> {
        lock(&self.value).clone()
    }
}

impl IdentityBackend for MemoryIdentityStore {
    fn load(&self) -> Result<Option<UserId>, AppError> {
        Ok(lock(&self.value).clone())
    }

    fn save(&self, id: &UserId) -> Result<(), AppError> {
        *lock(&self.value) = Some(id.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), AppError> {
        *lock(&self.value) = None;
        Ok(())
    }
}

/// Holds the single current [`UserId`] and keeps it persisted.
///
/// When the backend fails the store keeps working with an in-memory identity
/// for the rest of the process.
#[derive(Clone)]
pub struct IdentityStore {
    backend: Arc<dyn IdentityBackend>,
    current: Arc<Mutex<Option<UserId>>>,
}

impl IdentityStore {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self { backend, current: Arc::new(Mutex::new(None)) }
    }

    /// Returns the persisted identity, generating and persisting one if absent.
    pub fn get_or_create(&self) -> UserId {
        let mut current = lock(&self.current);
        if let Some(id) = current.as_ref() {
            return id.clone();
        }

        let id = match self.backend.load() {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = UserId::generate();
                if let Err(e) = self.backend.save(&id) {
                    warn!("Identity persistence unavailable, using in-memory identity: {e}");
                } else {
                    info!(user_id = %id, "Generated new user identity");
                }
                id
            }
            Err(e) => {
                warn!("Identity persistence unavailable, using in-memory identity: {e}");
                UserId::generate()
            }
        };
        *current = Some(id.clone());
        id
    }

    /// The identity currently in effect, without touching persistence.
    pub fn current(&self) -> Option<UserId> {
        lock(&self.current).clone()
    }

    /// Adopts a server-issued identity. Returns `true` when it differed.
    pub fn replace(&self, id: &UserId) -> bool {
        let mut current = lock(&self.current);
        if current.as_ref() == Some(id) {
            return false;
        }
        if let Err(e) = self.backend.save(id) {
            error!("Failed to persist replaced identity: {e}");
        }
        info!(user_id = %id, "Adopted server-issued identity");
        *current = Some(id.clone());
        true
    }

    /// Forgets the identity, both in memory and in persistence.
    pub fn clear(&self) {
        let mut current = lock(&self.current);
        if let Err(e) = self.backend.remove() {
            error!("Failed to clear persisted identity: {e}");
        }
        *current = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
