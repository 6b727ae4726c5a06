//! Reconciliation: diff the desired mix against what the backend was last
//! told and issue the smallest set of commands that converges the two.
//!
//! Passes are idempotent. A pass that fails anywhere leaves the snapshot
//! alone, so the next pass recomputes the same diff and retries it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use nocturne_audio::AudioPort;
use nocturne_types::{effective_volume, AudioCommand, MixState, SoundId, MAX_ACTIVE_SOUNDS};

use crate::error::EngineError;
use crate::snapshot::BackendSnapshot;

/// Volumes closer than this are treated as equal.
const VOLUME_EPSILON: f32 = 1e-6;

/// Commands for one pass and the snapshot they lead to.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub commands: Vec<AudioCommand>,
    pub target: BackendSnapshot,
    /// Ids beyond the cap that were left out of this pass.
    pub truncated: Vec<SoundId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub issued: Vec<AudioCommand>,
    pub truncated: Vec<SoundId>,
}

/// Compute one pass. Stops come first, then volume changes, then plays.
///
/// Headroom is sized by every active sound in the mix (after the cap), so
/// a layer that is present but not playing still reserves its share.
pub fn plan(desired: &MixState, snapshot: &BackendSnapshot) -> SyncPlan {
    if desired.paused {
        let commands = if snapshot.is_halted() && snapshot.is_empty() {
            Vec::new()
        } else {
            vec![AudioCommand::StopAll]
        };
        return SyncPlan {
            commands,
            target: BackendSnapshot::halted(),
            truncated: Vec::new(),
        };
    }

    let kept = desired.sounds.len().min(MAX_ACTIVE_SOUNDS);
    let truncated: Vec<SoundId> = desired.sounds[kept..].iter().map(|s| s.id.clone()).collect();
    let audible: Vec<_> = desired.sounds[..kept].iter().filter(|s| s.is_playing).collect();
    let count = kept;

    if audible.is_empty() {
        if snapshot.is_empty() {
            return SyncPlan {
                commands: Vec::new(),
                target: snapshot.clone(),
                truncated,
            };
        }
        return SyncPlan {
            commands: vec![AudioCommand::StopAll],
            target: BackendSnapshot::halted(),
            truncated,
        };
    }

    let wanted: Vec<(SoundId, f32)> = audible
        .iter()
        .map(|s| (s.id.clone(), effective_volume(s.volume, desired.master_volume, count)))
        .collect();

    let mut commands = Vec::new();
    for id in snapshot.ids() {
        if !wanted.iter().any(|(w, _)| w == id) {
            commands.push(AudioCommand::StopSound { id: id.clone() });
        }
    }
    for (id, volume) in &wanted {
        if let Some(current) = snapshot.get(id) {
            if (current - volume).abs() > VOLUME_EPSILON {
                commands.push(AudioCommand::AdjustVolume {
                    id: id.clone(),
                    volume: *volume,
                });
            }
        }
    }
    for (id, volume) in &wanted {
        if !snapshot.contains(id) {
            commands.push(AudioCommand::PlaySound {
                id: id.clone(),
                volume: *volume,
            });
        }
    }

    SyncPlan {
        commands,
        target: BackendSnapshot::playing(wanted.into_iter().collect::<BTreeMap<_, _>>()),
        truncated,
    }
}

/// Backend-agnostic reconciler around one `AudioPort`.
pub struct SyncMixUseCase {
    port: Arc<dyn AudioPort>,
    snapshot: Mutex<BackendSnapshot>,
}

impl SyncMixUseCase {
    pub fn new(port: Arc<dyn AudioPort>) -> Self {
        Self {
            port,
            snapshot: Mutex::new(BackendSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget what the backend was told; the next pass re-sends everything.
    pub fn invalidate(&self) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = BackendSnapshot::default();
    }

    /// Run one pass against `desired`.
    ///
    /// The snapshot lock is not held while commands are in flight, so an
    /// overlapping pass diffs against the previous snapshot and converges
    /// to the same place.
    pub fn execute(&self, desired: &MixState) -> Result<SyncReport, EngineError> {
        let current = self.snapshot();
        let SyncPlan {
            commands,
            target,
            truncated,
        } = plan(desired, &current);

        if !truncated.is_empty() {
            log::warn!(
                target: "sync",
                "mix holds {} sounds, playing the first {}",
                desired.sounds.len(),
                MAX_ACTIVE_SOUNDS
            );
        }

        let mut failures = Vec::new();
        for command in &commands {
            log::debug!(target: "sync", "{} <- {}", self.port.name(), command);
            if let Err(e) = self.port.dispatch(command) {
                log::warn!(target: "sync", "{} failed: {}", command, e);
                failures.push(format!("{command}: {e}"));
            }
        }

        if let Some(first) = failures.first() {
            return Err(EngineError::BackendCommandFailure {
                failed: failures.len(),
                first: first.clone(),
            });
        }

        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = target;
        Ok(SyncReport {
            issued: commands,
            truncated,
        })
    }
}
