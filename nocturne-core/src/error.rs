use nocturne_audio::PortError;
use nocturne_types::{MixError, ShareError, SoundId};
use thiserror::Error;

use crate::saved_mixes::RepositoryError;

/// Every failure the engine can report. None of them is fatal: each one
/// degrades to the last known good state or to an empty default.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("mix already holds the maximum of {limit} sounds")]
    CapacityExceeded { limit: usize },

    #[error("{failed} backend command(s) failed, first: {first}")]
    BackendCommandFailure { failed: usize, first: String },

    #[error("backend status unavailable: {0}")]
    SyncUnavailable(#[source] PortError),

    #[error("could not decode shared mix: {0}")]
    DecodeFailure(String),

    #[error("unknown sound: {0}")]
    UnknownSound(SoundId),

    #[error("sound already in mix: {0}")]
    DuplicateSound(SoundId),

    #[error("saved mixes: {0}")]
    Persistence(#[from] RepositoryError),
}

impl From<MixError> for EngineError {
    fn from(e: MixError) -> Self {
        match e {
            MixError::CapacityExceeded { limit } => EngineError::CapacityExceeded { limit },
            MixError::UnknownSound(id) => EngineError::UnknownSound(id),
            MixError::DuplicateSound(id) => EngineError::DuplicateSound(id),
        }
    }
}

impl From<ShareError> for EngineError {
    fn from(e: ShareError) -> Self {
        EngineError::DecodeFailure(e.to_string())
    }
}
