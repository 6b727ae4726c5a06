//! The vocabulary every backend is driven with.

use serde::{Deserialize, Serialize};

use crate::SoundId;

/// One-shot playback instruction. Volumes are linear in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AudioCommand {
    PlaySound { id: SoundId, volume: f32 },
    AdjustVolume { id: SoundId, volume: f32 },
    StopSound { id: SoundId },
    StopAll,
}

impl std::fmt::Display for AudioCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCommand::PlaySound { id, volume } => write!(f, "play {id} @ {volume:.3}"),
            AudioCommand::AdjustVolume { id, volume } => write!(f, "adjust {id} -> {volume:.3}"),
            AudioCommand::StopSound { id } => write!(f, "stop {id}"),
            AudioCommand::StopAll => f.write_str("stop all"),
        }
    }
}
