//! Persisted learning profile
//!
//! The profile is a single JSON record stored under [`PROFILE_KEY`]. It is
//! read once at startup, written whole after every mutation and removed on
//! clear. An unreadable or malformed record is replaced by a fresh profile.

use crate::error::{Result, WhiteMuseError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Storage key of the learning record
pub const PROFILE_KEY: &str = "whitemuse.learning.v1";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV_VAR: &str = "WHITEMUSE_DATA_DIR";

/// Neutral style value
pub const NEUTRAL_STYLE: f32 = 0.5;

/// Style scalars biasing generated copy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleWeights {
    pub sharp: f32,
    pub elegant: f32,
    pub short: f32,
}

impl Default for StyleWeights {
    fn default() -> Self {
        Self {
            sharp: NEUTRAL_STYLE,
            elegant: NEUTRAL_STYLE,
            short: NEUTRAL_STYLE,
        }
    }
}

/// Feedback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub used: u64,
    pub sold: u64,
}

/// Single-device learning state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub salt: u32,
    pub style: StyleWeights,
    pub events: EventCounts,
}

impl LearningProfile {
    /// Fresh profile with a random salt and neutral style
    #[must_use]
    pub fn fresh() -> Self {
        Self::with_salt(rand::random())
    }

    #[must_use]
    pub fn with_salt(salt: u32) -> Self {
        Self {
            salt,
            style: StyleWeights::default(),
            events: EventCounts::default(),
        }
    }

    /// Parse a stored record
    ///
    /// Out-of-range style values are clamped; non-finite values are rejected.
    ///
    /// # Errors
    /// - `PersistenceCorrupt` for malformed JSON or non-finite scalars
    pub fn from_json(record: &str) -> Result<Self> {
        let mut profile: Self = serde_json::from_str(record)
            .map_err(|e| WhiteMuseError::persistence_corrupt(e.to_string()))?;
        let style = profile.style;
        if ![style.sharp, style.elegant, style.short]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(WhiteMuseError::persistence_corrupt(
                "style values must be finite",
            ));
        }
        profile.clamp();
        Ok(profile)
    }

    /// Serialize for storage
    ///
    /// # Errors
    /// - Serialization failures
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| WhiteMuseError::internal(e.to_string()))
    }

    /// Clamp every style scalar to [0, 1]
    pub fn clamp(&mut self) {
        for value in [
            &mut self.style.sharp,
            &mut self.style.elegant,
            &mut self.style.short,
        ] {
            *value = if value.is_nan() {
                NEUTRAL_STYLE
            } else {
                (*value).clamp(0.0, 1.0)
            };
        }
    }
}

/// Key-value storage for the learning record
pub trait ProfileStore: Send + Sync {
    /// Read the record, `None` when absent
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the record
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the record; removing an absent record is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the platform data directory, or `WHITEMUSE_DATA_DIR`
    ///
    /// # Errors
    /// - No data directory can be determined
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

/// Data directory for persisted state
///
/// # Errors
/// - Neither the override variable nor a platform data directory is available
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV_VAR) {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::data_dir()
        .ok_or_else(|| {
            WhiteMuseError::invalid_config(format!(
                "Failed to determine data directory. Set {} environment variable.",
                DATA_DIR_ENV_VAR
            ))
        })?
        .join("whitemuse"))
}

impl ProfileStore for FileProfileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WhiteMuseError::file_io_error("read profile", &path, &e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| WhiteMuseError::file_io_error("create data directory", &self.dir, &e))?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| WhiteMuseError::file_io_error("write profile", &path, &e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WhiteMuseError::file_io_error("remove profile", &path, &e)),
        }
    }
}

/// In-process store, mainly for tests and embedding without a filesystem
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    record: Mutex<Option<(String, String)>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw record
    #[must_use]
    pub fn with_record(key: &str, value: &str) -> Self {
        Self {
            record: Mutex::new(Some((key.to_string(), value.to_string()))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<(String, String)>>> {
        self.record
            .lock()
            .map_err(|_| WhiteMuseError::internal("profile store lock poisoned"))
    }
}

impl ProfileStore for MemoryProfileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .as_ref()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        *self.lock()? = Some((key.to_string(), value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut record = self.lock()?;
        if record.as_ref().is_some_and(|(k, _)| k == key) {
            *record = None;
        }
        Ok(())
    }
}

/// Owner of the process-wide learning profile
///
/// Created once at startup and passed by reference to the copy engine.
pub struct ProfileService {
    store: Box<dyn ProfileStore>,
    profile: LearningProfile,
}

impl ProfileService {
    /// Load the stored profile, creating and saving a fresh one if absent
    ///
    /// A corrupt or unreadable record is logged and replaced.
    ///
    /// # Errors
    /// - Saving a newly created profile fails
    pub fn load(store: Box<dyn ProfileStore>) -> Result<Self> {
        let loaded = match store.read(PROFILE_KEY) {
            Ok(Some(record)) => match LearningProfile::from_json(&record) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("Learning profile reset: {}", e);
                    None
                },
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Learning profile unreadable, starting fresh: {}", e);
                None
            },
        };

        let service = match loaded {
            Some(profile) => {
                debug!(
                    "Loaded learning profile (used={}, sold={})",
                    profile.events.used, profile.events.sold
                );
                Self { store, profile }
            },
            None => {
                let service = Self {
                    store,
                    profile: LearningProfile::fresh(),
                };
                service.save()?;
                service
            },
        };
        Ok(service)
    }

    #[must_use]
    pub fn profile(&self) -> &LearningProfile {
        &self.profile
    }

    /// Apply a mutation, clamp, and persist
    ///
    /// The in-memory profile only changes once the write succeeded.
    ///
    /// # Errors
    /// - Persisting the updated record fails
    pub fn update<F: FnOnce(&mut LearningProfile)>(&mut self, mutate: F) -> Result<()> {
        let mut next = self.profile.clone();
        mutate(&mut next);
        next.clamp();
        let record = next.to_json()?;
        self.store.write(PROFILE_KEY, &record)?;
        self.profile = next;
        Ok(())
    }

    /// Remove the stored record and start over with a fresh salt
    ///
    /// # Errors
    /// - Removing the record fails
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(PROFILE_KEY)?;
        self.profile = LearningProfile::fresh();
        info!("Learning profile cleared");
        Ok(())
    }

    /// Write the whole record
    ///
    /// # Errors
    /// - Serialization or storage failures
    pub fn save(&self) -> Result<()> {
        let record = self.profile.to_json()?;
        self.store.write(PROFILE_KEY, &record)
    }
}

impl std::fmt::Debug for ProfileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileService")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
