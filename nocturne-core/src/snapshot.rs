//! What the backend was last told. A cache for diffing, not a source of truth.

use std::collections::BTreeMap;

use nocturne_types::SoundId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendSnapshot {
    volumes: BTreeMap<SoundId, f32>,
    /// The last successful pass silenced the backend with a stop-all.
    halted: bool,
}

impl BackendSnapshot {
    pub fn playing(volumes: BTreeMap<SoundId, f32>) -> Self {
        Self {
            volumes,
            halted: false,
        }
    }

    pub fn halted() -> Self {
        Self {
            volumes: BTreeMap::new(),
            halted: true,
        }
    }

    pub fn get(&self, id: &SoundId) -> Option<f32> {
        self.volumes.get(id).copied()
    }

    pub fn contains(&self, id: &SoundId) -> bool {
        self.volumes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SoundId> {
        self.volumes.keys()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
