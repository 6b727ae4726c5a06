//! # nocturne-types
//!
//! Shared type definitions for the Nocturne ambient mixer.
//! This crate holds the data model and the pure functions over it
//! (headroom math, the share codec, curated presets). It has no I/O and no
//! threads, so every other crate can depend on it.

pub mod command;
pub mod headroom;
pub mod mix;
pub mod presets;
pub mod registry;
pub mod share;
pub mod sound;
pub mod timer;

pub use command::AudioCommand;
pub use headroom::{effective_volume, headroom_gain};
pub use mix::{ActiveSound, MixError, MixState, DEFAULT_VOLUME, MAX_ACTIVE_SOUNDS, MAX_VOLUME};
pub use presets::{CuratedMix, CURATED_MIXES};
pub use registry::SoundRegistry;
pub use share::{decode_mix, decode_mix_with, encode_mix, try_decode_mix, ShareError};
pub use sound::{Category, FilterSpec, Modulation, NoiseColor, SoundDescriptor, SoundSource, SynthParams};
pub use timer::{SleepTimerState, TimerPhase, MAX_TIMER_SECONDS, TIMER_PRESETS};

use std::borrow::Borrow;

/// Unique identifier for a sound in the catalog.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SoundId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for SoundId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
