//! Curated mixes shipped with the app.

use crate::mix::ActiveSound;

/// A named, fixed mix. `key` is what `MixState::current_mix_key` records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuratedMix {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub sounds: &'static [(&'static str, u8)],
}

impl CuratedMix {
    pub fn find(key: &str) -> Option<&'static CuratedMix> {
        CURATED_MIXES.iter().find(|m| m.key == key)
    }

    pub fn active_sounds(&self) -> Vec<ActiveSound> {
        self.sounds
            .iter()
            .map(|&(id, volume)| ActiveSound::new(id, volume))
            .collect()
    }
}

pub static CURATED_MIXES: [CuratedMix; 3] = [
    CuratedMix {
        key: "deep-sleep-cabin",
        name: "Deep Sleep Cabin",
        description: "Heavy rain on the roof, a low fire and wind in the pines",
        sounds: &[("heavy-downpour", 60), ("fireplace", 30), ("wind-pines", 15)],
    },
    CuratedMix {
        key: "zen-garden",
        name: "Zen Garden",
        description: "A slow river with faraway gulls over soft white noise",
        sounds: &[("gentle-river", 50), ("distant-seagulls", 10), ("white-noise", 10)],
    },
    CuratedMix {
        key: "focus-flow",
        name: "Focus Flow",
        description: "Brown noise under quiet cafe chatter",
        sounds: &[("brown-noise", 60), ("coffee-shop", 20)],
    },
];
