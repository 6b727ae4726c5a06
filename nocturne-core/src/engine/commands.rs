use std::sync::Arc;

use nocturne_types::{ActiveSound, MixState, SleepTimerState, SoundId};

use crate::saved_mixes::SavedMix;

/// Commands sent from the main thread to the engine thread.
#[derive(Debug, Clone)]
pub enum EngineCmd {
    AddSound(SoundId),
    RemoveSound(SoundId),
    SetVolume { id: SoundId, volume: u8 },
    SetMasterVolume(u8),
    TogglePause,
    /// Replace the whole mix.
    SetMix(Vec<ActiveSound>),
    LoadPreset(String),
    /// Load a mix from its share string.
    LoadShared(String),
    LoadSaved(String),
    Randomize,
    SaveMix { name: String },
    DeleteSavedMix(String),
    ListSavedMixes,
    SetTimerDuration(u32),
    StartTimer,
    PauseTimer,
    Suspend,
    Resume,
    /// The backend lost output (e.g. another app took audio focus).
    PlaybackInterrupted,
    Shutdown,
}

/// Feedback sent from the engine thread back to the main thread.
#[derive(Debug, Clone)]
pub enum EngineFeedback {
    MixChanged(Arc<MixState>),
    TimerChanged(SleepTimerState),
    TimerExpired,
    CapacityReached { rejected: Vec<SoundId> },
    SyncFailed(String),
    DecodeFailure(String),
    SavedMixes(Vec<SavedMix>),
    Error(String),
}
