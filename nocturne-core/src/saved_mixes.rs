//! Named mixes the user saved, persisted as JSON under one key of an opaque
//! key-value repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nocturne_types::ActiveSound;

/// Repository key the whole list is stored under.
pub const SAVED_MIXES_KEY: &str = "saved-mixes";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opaque string key-value store.
pub trait MixRepository: Send {
    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError>;
    fn remove(&mut self, key: &str) -> Result<(), RepositoryError>;
}

/// One file per key under a directory.
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data_dir>/nocturne`, or the working directory if there is none.
    pub fn default_location() -> Self {
        let dir = dirs::data_dir()
            .map(|d| d.join("nocturne"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl MixRepository for JsonFileRepository {
    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), RepositoryError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: HashMap<String, String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MixRepository for MemoryRepository {
    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMix {
    pub id: String,
    pub name: String,
    pub sounds: Vec<ActiveSound>,
    #[serde(with = "system_time_serde")]
    pub created_at: SystemTime,
}

pub struct SavedMixes {
    repo: Box<dyn MixRepository>,
}

impl SavedMixes {
    pub fn new(repo: Box<dyn MixRepository>) -> Self {
        Self { repo }
    }

    /// All saved mixes, newest first. A corrupt entry reads as empty.
    pub fn list(&self) -> Result<Vec<SavedMix>, RepositoryError> {
        let Some(raw) = self.repo.get(SAVED_MIXES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(mixes) => Ok(mixes),
            Err(e) => {
                log::warn!(target: "engine", "saved mixes unreadable, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Like `list`, but before a write: an unreadable entry is copied to a
    /// backup key so the write cannot destroy it.
    fn load_for_write(&mut self) -> Result<Vec<SavedMix>, RepositoryError> {
        let Some(raw) = self.repo.get(SAVED_MIXES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(mixes) => Ok(mixes),
            Err(e) => {
                let backup = backup_key(SystemTime::now());
                self.repo.set(&backup, &raw)?;
                log::warn!(
                    target: "engine",
                    "saved mixes unreadable ({}), kept a copy under {:?}",
                    e,
                    backup
                );
                Ok(Vec::new())
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<SavedMix>, RepositoryError> {
        Ok(self.list()?.into_iter().find(|m| m.id == id))
    }

    /// Store `sounds` under `name`. Sounds at volume 0 are left out.
    pub fn save(&mut self, name: &str, sounds: &[ActiveSound]) -> Result<SavedMix, RepositoryError> {
        let mut mixes = self.load_for_write()?;
        let created_at = SystemTime::now();
        let mix = SavedMix {
            id: new_id(created_at, &mixes),
            name: name.trim().to_string(),
            sounds: sounds.iter().filter(|s| s.volume > 0).cloned().collect(),
            created_at,
        };
        mixes.insert(0, mix.clone());
        self.write(&mixes)?;
        log::info!(target: "engine", "saved mix {} as {:?}", mix.id, mix.name);
        Ok(mix)
    }

    /// Returns whether anything was deleted.
    pub fn delete(&mut self, id: &str) -> Result<bool, RepositoryError> {
        let mut mixes = self.load_for_write()?;
        let before = mixes.len();
        mixes.retain(|m| m.id != id);
        if mixes.len() == before {
            return Ok(false);
        }
        if mixes.is_empty() {
            self.repo.remove(SAVED_MIXES_KEY)?;
        } else {
            self.write(&mixes)?;
        }
        Ok(true)
    }

    fn write(&mut self, mixes: &[SavedMix]) -> Result<(), RepositoryError> {
        let json = serde_json::to_string_pretty(mixes)?;
        self.repo.set(SAVED_MIXES_KEY, &json)
    }
}

fn backup_key(now: SystemTime) -> String {
    let millis = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{SAVED_MIXES_KEY}-corrupt-{millis}")
}

fn new_id(now: SystemTime, existing: &[SavedMix]) -> String {
    let mut seed = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0);
    loop {
        let id = format!("mix-{:08x}", seed);
        if !existing.iter().any(|m| m.id == id) {
            return id;
        }
        seed = seed.wrapping_add(1);
    }
}

mod system_time_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sounds() -> Vec<ActiveSound> {
        vec![
            ActiveSound::new("crickets", 40),
            ActiveSound::new("campfire", 0),
            ActiveSound::new("heavy-rain", 70),
        ]
    }

    #[test]
    fn test_save_list_delete() {
        let mut saved = SavedMixes::new(Box::new(MemoryRepository::new()));
        assert!(saved.list().unwrap().is_empty());

        let first = saved.save("  Night  ", &sounds()).unwrap();
        let second = saved.save("Storm", &sounds()[2..]).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.name, "Night");
        assert_eq!(first.sounds.len(), 2);

        let list = saved.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second.id);
        let loaded = saved.get(&first.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Night");
        assert_eq!(loaded.sounds, first.sounds);

        assert!(saved.delete(&first.id).unwrap());
        assert!(!saved.delete(&first.id).unwrap());
        assert_eq!(saved.list().unwrap().len(), 1);
    }

    #[test]
    fn test_file_repository_persists() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut saved = SavedMixes::new(Box::new(JsonFileRepository::new(dir.path())));
            saved.save("Focus", &sounds()).unwrap().id
        };
        let saved = SavedMixes::new(Box::new(JsonFileRepository::new(dir.path())));
        let mix = saved.get(&id).unwrap().unwrap();
        assert_eq!(mix.name, "Focus");
        assert_eq!(mix.sounds[0].id.as_str(), "crickets");
    }

    #[test]
    fn test_corrupt_entry_reads_empty() {
        let mut repo = MemoryRepository::new();
        repo.set(SAVED_MIXES_KEY, "{not json").unwrap();
        let saved = SavedMixes::new(Box::new(repo));
        assert!(saved.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_over_corrupt_entry_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = JsonFileRepository::new(dir.path());
        repo.set(SAVED_MIXES_KEY, "{not json").unwrap();

        let mut saved = SavedMixes::new(Box::new(JsonFileRepository::new(dir.path())));
        saved.save("Fresh", &sounds()).unwrap();
        assert_eq!(saved.list().unwrap().len(), 1);

        let backups: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("saved-mixes-corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        let raw = std::fs::read_to_string(dir.path().join(&backups[0])).unwrap();
        assert_eq!(raw, "{not json");
    }

    #[test]
    fn test_missing_key_in_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = JsonFileRepository::new(dir.path().join("nested"));
        assert_eq!(repo.get("absent").unwrap(), None);
        repo.remove("absent").unwrap();
    }

    #[test]
    fn test_serialized_shape() {
        let mix = SavedMix {
            id: "mix-00000001".into(),
            name: "A".into(),
            sounds: vec![ActiveSound::new("crickets", 40)],
            created_at: UNIX_EPOCH + std::time::Duration::from_millis(1_500),
        };
        let json = serde_json::to_value(&mix).unwrap();
        assert_eq!(json["createdAt"], 1_500);
        assert_eq!(json["sounds"][0]["id"], "crickets");
    }
}
