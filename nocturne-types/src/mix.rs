//! The user's declared mix.

use serde::{Deserialize, Serialize};

use crate::SoundId;

/// Hard cap on simultaneously active sounds.
pub const MAX_ACTIVE_SOUNDS: usize = 10;
/// Volume a sound starts at when added without an explicit level.
pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

/// One layer of the mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSound {
    pub id: SoundId,
    pub volume: u8,
    pub is_playing: bool,
}

impl ActiveSound {
    pub fn new(id: impl Into<SoundId>, volume: u8) -> Self {
        Self {
            id: id.into(),
            volume: volume.min(MAX_VOLUME),
            is_playing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MixError {
    #[error("mix already holds the maximum of {limit} sounds")]
    CapacityExceeded { limit: usize },
    #[error("unknown sound: {0}")]
    UnknownSound(SoundId),
    #[error("sound already in mix: {0}")]
    DuplicateSound(SoundId),
}

/// Authoritative mix record.
///
/// `sounds` is kept in insertion order with unique ids. The mutators below
/// uphold the cap; code that writes the field directly takes that on itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixState {
    pub sounds: Vec<ActiveSound>,
    pub master_volume: u8,
    pub paused: bool,
    pub current_mix_key: Option<String>,
}

impl Default for MixState {
    fn default() -> Self {
        Self::new(MAX_VOLUME)
    }
}

impl MixState {
    pub fn new(master_volume: u8) -> Self {
        Self {
            sounds: Vec::new(),
            master_volume: master_volume.min(MAX_VOLUME),
            paused: false,
            current_mix_key: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sounds.len() >= MAX_ACTIVE_SOUNDS
    }

    pub fn get(&self, id: &str) -> Option<&ActiveSound> {
        self.sounds.iter().find(|s| s.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, id: SoundId, volume: u8) -> Result<(), MixError> {
        if self.contains(id.as_str()) {
            return Err(MixError::DuplicateSound(id));
        }
        if self.is_full() {
            return Err(MixError::CapacityExceeded {
                limit: MAX_ACTIVE_SOUNDS,
            });
        }
        self.sounds.push(ActiveSound::new(id, volume));
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<ActiveSound> {
        let idx = self.sounds.iter().position(|s| s.id.as_str() == id)?;
        Some(self.sounds.remove(idx))
    }

    /// Returns false when `id` is not in the mix.
    pub fn set_volume(&mut self, id: &str, volume: u8) -> bool {
        match self.sounds.iter_mut().find(|s| s.id.as_str() == id) {
            Some(sound) => {
                sound.volume = volume.min(MAX_VOLUME);
                true
            }
            None => false,
        }
    }

    pub fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume.min(MAX_VOLUME);
    }

    /// Bulk replace. Duplicate ids keep their first occurrence; anything past
    /// the cap is dropped. Returns the ids the cap dropped.
    pub fn replace(&mut self, sounds: Vec<ActiveSound>) -> Vec<SoundId> {
        self.sounds.clear();
        let mut dropped = Vec::new();
        for mut sound in sounds {
            if self.contains(sound.id.as_str()) {
                continue;
            }
            if self.is_full() {
                dropped.push(sound.id);
                continue;
            }
            sound.volume = sound.volume.min(MAX_VOLUME);
            self.sounds.push(sound);
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.sounds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_mix() -> MixState {
        let mut mix = MixState::default();
        for i in 0..MAX_ACTIVE_SOUNDS {
            mix.add(SoundId::new(format!("s{i}")), DEFAULT_VOLUME).unwrap();
        }
        mix
    }

    #[test]
    fn test_add_and_remove() {
        let mut mix = MixState::default();
        mix.add(SoundId::new("crickets"), 40).unwrap();
        assert_eq!(mix.get("crickets").map(|s| s.volume), Some(40));
        assert!(mix.get("crickets").unwrap().is_playing);

        assert_eq!(
            mix.add(SoundId::new("crickets"), 10),
            Err(MixError::DuplicateSound(SoundId::new("crickets")))
        );

        assert!(mix.remove("crickets").is_some());
        assert!(mix.remove("crickets").is_none());
        assert!(mix.is_empty());
    }

    #[test]
    fn test_eleventh_sound_rejected() {
        let mut mix = full_mix();
        let before = mix.clone();
        let err = mix.add(SoundId::new("one-too-many"), 50).unwrap_err();
        assert_eq!(err, MixError::CapacityExceeded { limit: 10 });
        assert_eq!(mix, before);
    }

    #[test]
    fn test_volumes_clamped() {
        let mut mix = MixState::new(250);
        assert_eq!(mix.master_volume, 100);
        mix.add(SoundId::new("fireplace"), 180).unwrap();
        assert_eq!(mix.get("fireplace").unwrap().volume, 100);
        assert!(mix.set_volume("fireplace", 30));
        assert!(!mix.set_volume("missing", 30));
    }

    #[test]
    fn test_replace_dedupes_and_caps() {
        let mut mix = MixState::default();
        let mut incoming: Vec<ActiveSound> = (0..12)
            .map(|i| ActiveSound::new(format!("s{i}"), 60))
            .collect();
        incoming.insert(1, ActiveSound::new("s0", 10));

        let dropped = mix.replace(incoming);
        assert_eq!(dropped, vec![SoundId::new("s10"), SoundId::new("s11")]);
        assert_eq!(mix.len(), MAX_ACTIVE_SOUNDS);
        assert_eq!(mix.sounds[0].volume, 60);
        assert_eq!(mix.sounds[9].id.as_str(), "s9");
    }
}
