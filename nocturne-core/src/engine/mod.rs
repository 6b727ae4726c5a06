//! The engine: one owner for the mix store, the reconciler, the sleep
//! timer, lifecycle bookkeeping and saved mixes.
//!
//! `Engine` is synchronous. `thread::run` drives it from a dedicated thread
//! and `MixHandle` talks to that thread over channels; tests drive it
//! directly.

mod commands;
mod handle;
mod thread;

pub use commands::{EngineCmd, EngineFeedback};
pub use handle::{MixHandle, MixReadState};

use std::sync::Arc;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nocturne_audio::AudioPort;
use nocturne_types::{
    try_decode_mix, ActiveSound, CuratedMix, MixError, MixState, SleepTimerState, SoundId,
    SoundRegistry,
};

use crate::config::Config;
use crate::error::EngineError;
use crate::lifecycle::LifecycleCoordinator;
use crate::randomizer::random_catalog_mix;
use crate::saved_mixes::{MixRepository, SavedMixes};
use crate::snapshot::BackendSnapshot;
use crate::store::{MixStore, StoreEvent};
use crate::sync::SyncMixUseCase;
use crate::timer::{TimerEvent, TimerOrchestrator};

pub struct Engine {
    store: MixStore,
    store_rx: Receiver<StoreEvent>,
    sync: SyncMixUseCase,
    timer: TimerOrchestrator,
    lifecycle: LifecycleCoordinator,
    saved: SavedMixes,
    registry: SoundRegistry,
    rng: StdRng,
    port: Arc<dyn AudioPort>,
    feedback_tx: Sender<EngineFeedback>,
    auto_start_on_add: bool,
    /// Reconcile on the next pump even without a store change.
    needs_sync: bool,
    last_timer: SleepTimerState,
}

impl Engine {
    pub fn new(
        port: Arc<dyn AudioPort>,
        config: &Config,
        repo: Box<dyn MixRepository>,
        feedback_tx: Sender<EngineFeedback>,
    ) -> Self {
        // Headroom and master volume are folded into every per-sound volume.
        if let Err(e) = port.set_master_volume(1.0) {
            log::warn!(target: "engine", "could not reset {} master stage: {}", port.name(), e);
        }

        let store = MixStore::new(MixState::new(config.master_volume()), config.default_volume());
        let store_rx = store.subscribe();
        let timer = TimerOrchestrator::new(
            Arc::clone(&port),
            config.timer_seconds(),
            config.fade_out_seconds(),
        );
        let last_timer = timer.state().clone();

        Self {
            store,
            store_rx,
            sync: SyncMixUseCase::new(Arc::clone(&port)),
            timer,
            lifecycle: LifecycleCoordinator::new(config.shutdown_grace()),
            saved: SavedMixes::new(repo),
            registry: SoundRegistry::new(),
            rng: StdRng::from_entropy(),
            port,
            feedback_tx,
            auto_start_on_add: config.auto_start_on_add(),
            needs_sync: false,
            last_timer,
        }
    }

    /// Make `Randomize` deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn mix(&self) -> Arc<MixState> {
        self.store.snapshot()
    }

    pub fn timer_state(&self) -> &SleepTimerState {
        self.timer.state()
    }

    pub fn backend_snapshot(&self) -> BackendSnapshot {
        self.sync.snapshot()
    }

    pub fn is_suspended(&self) -> bool {
        self.lifecycle.is_suspended()
    }

    // ── Command handling ──────────────────────────────────────────

    /// Handle one command, then reconcile. Returns true on shutdown.
    pub fn apply(&mut self, cmd: EngineCmd) -> bool {
        let quit = self.handle(cmd);
        self.pump();
        quit
    }

    /// Handle one command without reconciling. Returns true on shutdown.
    pub fn handle(&mut self, cmd: EngineCmd) -> bool {
        log::debug!(target: "engine", "{:?}", cmd);
        match cmd {
            EngineCmd::AddSound(id) => self.add_sound(id),
            EngineCmd::RemoveSound(id) => self.remove_sound(&id),
            EngineCmd::SetVolume { id, volume } => {
                if self.store.set_volume(id.as_str(), volume) {
                    if let Some(sound) = self.store.snapshot().get(id.as_str()) {
                        self.timer.record_default(&id, sound.volume);
                    }
                    // Inside the fade window the new level is a new pre-fade volume.
                    self.apply_fade();
                }
            }
            EngineCmd::SetMasterVolume(volume) => self.store.set_master_volume(volume),
            EngineCmd::TogglePause => self.toggle_pause(),
            EngineCmd::SetMix(sounds) => self.load_mix(sounds, None),
            EngineCmd::LoadPreset(key) => match CuratedMix::find(&key) {
                Some(preset) => self.load_mix(preset.active_sounds(), Some(preset.key.to_string())),
                None => self.emit(EngineFeedback::Error(format!("unknown preset: {key}"))),
            },
            EngineCmd::LoadShared(encoded) => self.load_shared(&encoded),
            EngineCmd::LoadSaved(id) => match self.saved.get(&id) {
                Ok(Some(mix)) => self.load_mix(mix.sounds, Some(mix.id)),
                Ok(None) => self.emit(EngineFeedback::Error(format!("no saved mix {id}"))),
                Err(e) => self.report(e.into()),
            },
            EngineCmd::Randomize => {
                let sounds = random_catalog_mix(&self.registry, &mut self.rng);
                self.load_mix(sounds, None);
            }
            EngineCmd::SaveMix { name } => self.save_mix(&name),
            EngineCmd::DeleteSavedMix(id) => match self.saved.delete(&id) {
                Ok(_) => self.publish_saved(),
                Err(e) => self.report(e.into()),
            },
            EngineCmd::ListSavedMixes => self.publish_saved(),
            EngineCmd::SetTimerDuration(seconds) => {
                self.restore_volumes();
                self.timer.set_duration(seconds);
            }
            EngineCmd::StartTimer => self.start_timer(),
            EngineCmd::PauseTimer => {
                if self.timer.pause() {
                    self.restore_volumes();
                }
            }
            EngineCmd::Suspend => self.suspend_at(SystemTime::now()),
            EngineCmd::Resume => self.resume_at(SystemTime::now()),
            EngineCmd::PlaybackInterrupted => {
                if !self.store.snapshot().paused {
                    log::info!(target: "engine", "playback interrupted, pausing mix");
                    self.pause_mix();
                }
            }
            EngineCmd::Shutdown => {
                self.terminate();
                return true;
            }
        }
        false
    }

    fn add_sound(&mut self, id: SoundId) {
        match self.store.add_sound(id.clone()) {
            Ok(()) => {
                let mix = self.store.snapshot();
                if self.auto_start_on_add {
                    self.restore_volumes();
                    if self.timer.restart(mix.len()) {
                        self.timer.capture_defaults(&self.store.snapshot());
                        return;
                    }
                }
                if let Some(sound) = mix.get(id.as_str()) {
                    self.timer.record_default(&id, sound.volume);
                }
            }
            // Surfaced through the store's capacity event.
            Err(MixError::CapacityExceeded { .. }) => {}
            Err(e) => self.report(e.into()),
        }
    }

    fn remove_sound(&mut self, id: &SoundId) {
        let Some(now_empty) = self.store.remove_sound(id.as_str()) else {
            return;
        };
        self.timer.forget_default(id.as_str());
        if now_empty {
            self.timer.pause();
        }
    }

    fn toggle_pause(&mut self) {
        let mix = self.store.snapshot();
        if !mix.paused {
            self.pause_mix();
            return;
        }
        if mix.is_empty() {
            return;
        }
        self.store.set_paused(false);
        self.start_timer();
    }

    /// Pause playback and the countdown in one store commit.
    fn pause_mix(&mut self) {
        self.timer.pause();
        let timer = &self.timer;
        self.store.update(|mix| {
            mix.paused = true;
            timer.restore_defaults(mix);
        });
    }

    fn start_timer(&mut self) {
        let mix = self.store.snapshot();
        if self.timer.start(mix.len()) {
            self.timer.capture_defaults(&mix);
        }
    }

    /// Bulk replace through the regular reconciliation path.
    fn load_mix(&mut self, sounds: Vec<ActiveSound>, mix_key: Option<String>) {
        self.store.set_mix(sounds, mix_key);
        self.timer.capture_defaults(&self.store.snapshot());
        self.apply_fade();
    }

    /// A bad or empty share string leaves the current mix in place.
    fn load_shared(&mut self, encoded: &str) {
        let registry = self.registry;
        match try_decode_mix(encoded, |id| registry.contains(id)) {
            Ok(sounds) if !sounds.is_empty() => self.load_mix(sounds, None),
            Ok(_) => {
                log::warn!(target: "engine", "shared mix has no playable sounds");
                self.emit(EngineFeedback::DecodeFailure(
                    EngineError::DecodeFailure("no known sounds".into()).to_string(),
                ));
            }
            Err(e) => {
                let e = EngineError::from(e);
                log::warn!(target: "engine", "{}", e);
                self.emit(EngineFeedback::DecodeFailure(e.to_string()));
            }
        }
    }

    fn save_mix(&mut self, name: &str) {
        let mut mix = MixState::clone(&self.store.snapshot());
        if mix.is_empty() {
            self.emit(EngineFeedback::Error("nothing to save: mix is empty".into()));
            return;
        }
        // Save what the user set, not the faded levels.
        self.timer.restore_defaults(&mut mix);
        match self.saved.save(name, &mix.sounds) {
            Ok(_) => self.publish_saved(),
            Err(e) => self.report(e.into()),
        }
    }

    // ── Clock ─────────────────────────────────────────────────────

    pub fn tick(&mut self) {
        self.advance_clock(1);
    }

    /// Account for `seconds` of elapsed time. Ignored while suspended.
    pub fn advance_clock(&mut self, seconds: u32) {
        if self.lifecycle.is_suspended() {
            return;
        }
        match self.timer.advance(seconds) {
            Some(TimerEvent::Expired) => self.on_timer_expired(),
            _ => self.apply_fade(),
        }
        self.pump();
    }

    fn on_timer_expired(&mut self) {
        let timer = &self.timer;
        self.store.update(|mix| {
            mix.paused = true;
            timer.restore_defaults(mix);
        });
        self.emit(EngineFeedback::TimerExpired);
    }

    fn apply_fade(&mut self) {
        if self.timer.fade_factor().is_none() {
            return;
        }
        let timer = &self.timer;
        self.store.update(|mix| timer.apply_fade(mix));
    }

    fn restore_volumes(&mut self) {
        let timer = &self.timer;
        self.store.update(|mix| timer.restore_defaults(mix));
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    pub fn suspend_at(&mut self, now: SystemTime) {
        self.lifecycle.suspend(now);
    }

    /// Catch the timer up on the time spent suspended, reconcile it with the
    /// backend's own countdown, then re-send the whole mix.
    pub fn resume_at(&mut self, now: SystemTime) {
        if !self.lifecycle.is_suspended() {
            return;
        }
        let elapsed = self.lifecycle.resume(now);
        let mut event = self.timer.advance(elapsed);
        if event.is_none() {
            // Failure is already logged; the local clock carries on.
            event = self.timer.sync_from_native().unwrap_or(None);
        }
        match event {
            Some(TimerEvent::Expired) => self.on_timer_expired(),
            Some(TimerEvent::Adjusted { .. }) | None => self.apply_fade(),
        }
        self.sync.invalidate();
        self.needs_sync = true;
        self.pump();
    }

    /// Best-effort stop of all playback at teardown.
    pub fn terminate(&self) {
        log::info!(target: "lifecycle", "terminating, stopping {}", self.port.name());
        self.lifecycle.terminate(Arc::clone(&self.port));
    }

    // ── Reconciliation ────────────────────────────────────────────

    /// Drain store events and reconcile against the latest state.
    /// A burst of changes collapses into one pass.
    pub fn pump(&mut self) {
        let mut latest = None;
        let events: Vec<StoreEvent> = self.store_rx.try_iter().collect();
        for event in events {
            match event {
                StoreEvent::Changed(state) => latest = Some(state),
                StoreEvent::CapacityReached { rejected } => {
                    self.emit(EngineFeedback::CapacityReached { rejected })
                }
            }
        }
        if latest.is_none() && self.needs_sync {
            latest = Some(self.store.snapshot());
        }
        self.needs_sync = false;

        if let Some(state) = latest {
            self.emit(EngineFeedback::MixChanged(Arc::clone(&state)));
            self.reconcile(&state);
        }
        self.publish_timer();
    }

    fn reconcile(&self, state: &MixState) {
        match self.sync.execute(state) {
            Ok(report) => {
                if !report.truncated.is_empty() {
                    self.emit(EngineFeedback::CapacityReached {
                        rejected: report.truncated,
                    });
                }
            }
            Err(e) => self.emit(EngineFeedback::SyncFailed(e.to_string())),
        }
    }

    fn publish_timer(&mut self) {
        if self.timer.state() != &self.last_timer {
            self.last_timer = self.timer.state().clone();
            self.emit(EngineFeedback::TimerChanged(self.last_timer.clone()));
        }
    }

    fn publish_saved(&self) {
        match self.saved.list() {
            Ok(mixes) => self.emit(EngineFeedback::SavedMixes(mixes)),
            Err(e) => self.report(e.into()),
        }
    }

    fn report(&self, e: EngineError) {
        log::warn!(target: "engine", "{}", e);
        self.emit(EngineFeedback::Error(e.to_string()));
    }

    fn emit(&self, feedback: EngineFeedback) {
        // A closed channel means the main thread is gone; nothing to tell.
        let _ = self.feedback_tx.send(feedback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocturne_audio::{PortOp, TestPort};
    use nocturne_types::encode_mix;

    use crate::saved_mixes::MemoryRepository;

    fn setup() -> (Arc<TestPort>, Engine, Receiver<EngineFeedback>) {
        let port = Arc::new(TestPort::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = Config::from_toml_str("[timer]\nauto_start_on_add = false").unwrap();
        let engine = Engine::new(port.clone(), &config, Box::new(MemoryRepository::new()), tx)
            .with_seed(3);
        port.clear();
        (port, engine, rx)
    }

    #[test]
    fn test_master_stage_held_at_unity() {
        let port = Arc::new(TestPort::new());
        let (tx, _rx) = crossbeam_channel::unbounded();
        let _engine = Engine::new(port.clone(), &Config::default(), Box::new(MemoryRepository::new()), tx);
        assert_eq!(port.operations(), vec![PortOp::SetMaster(1.0)]);
    }

    #[test]
    fn test_add_plays_sound() {
        let (port, mut engine, rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        assert_eq!(
            port.operations(),
            vec![PortOp::Play {
                id: SoundId::new("crickets"),
                volume: 0.5
            }]
        );
        assert!(rx.try_iter().any(|f| matches!(f, EngineFeedback::MixChanged(_))));
    }

    #[test]
    fn test_eleventh_sound_rejected_without_commands() {
        let (port, mut engine, rx) = setup();
        let ids: Vec<_> = SoundRegistry::new().ids().take(11).collect();
        for id in &ids[..10] {
            engine.apply(EngineCmd::AddSound(id.clone()));
        }
        port.clear();
        rx.try_iter().for_each(drop);

        engine.apply(EngineCmd::AddSound(ids[10].clone()));
        assert!(port.operations().is_empty());
        assert_eq!(engine.mix().len(), 10);
        let feedback: Vec<_> = rx.try_iter().collect();
        assert!(feedback.iter().any(|f| matches!(
            f,
            EngineFeedback::CapacityReached { rejected } if rejected == &vec![ids[10].clone()]
        )));
    }

    #[test]
    fn test_removing_last_sound_pauses_mix_and_timer() {
        let (_port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        engine.apply(EngineCmd::SetTimerDuration(600));
        engine.apply(EngineCmd::StartTimer);
        engine.advance_clock(100);
        engine.apply(EngineCmd::RemoveSound(SoundId::new("crickets")));

        assert!(engine.mix().paused);
        assert!(!engine.timer_state().is_running);
        assert_eq!(engine.timer_state().time_left, 500);
    }

    #[test]
    fn test_shared_mix_loads_and_bad_input_keeps_current() {
        let (_port, mut engine, rx) = setup();
        let shared = encode_mix(&[ActiveSound::new("small-campfire", 70)]);
        engine.apply(EngineCmd::LoadShared(shared));
        assert_eq!(engine.mix().get("small-campfire").unwrap().volume, 70);

        rx.try_iter().for_each(drop);
        engine.apply(EngineCmd::LoadShared("@@not base64@@".into()));
        assert_eq!(engine.mix().len(), 1);
        assert!(rx
            .try_iter()
            .any(|f| matches!(f, EngineFeedback::DecodeFailure(_))));
    }

    #[test]
    fn test_preset_sets_mix_key() {
        let (_port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::LoadPreset("zen-garden".into()));
        let mix = engine.mix();
        assert_eq!(mix.current_mix_key.as_deref(), Some("zen-garden"));
        assert!(!mix.is_empty());
        assert!(!mix.paused);
    }

    #[test]
    fn test_save_and_load_saved_mix() {
        let (_port, mut engine, rx) = setup();
        engine.apply(EngineCmd::LoadPreset("focus-flow".into()));
        engine.apply(EngineCmd::SaveMix { name: "Desk".into() });
        let saved = rx
            .try_iter()
            .find_map(|f| match f {
                EngineFeedback::SavedMixes(list) => Some(list),
                _ => None,
            })
            .unwrap();
        assert_eq!(saved.len(), 1);

        engine.apply(EngineCmd::SetMix(Vec::new()));
        engine.apply(EngineCmd::LoadSaved(saved[0].id.clone()));
        let mix = engine.mix();
        assert_eq!(mix.current_mix_key.as_deref(), Some(saved[0].id.as_str()));
        assert_eq!(mix.sounds, saved[0].sounds);
    }

    #[test]
    fn test_fade_then_expiry_stops_once_and_restores_volumes() {
        let (port, mut engine, rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        engine.apply(EngineCmd::SetVolume {
            id: SoundId::new("crickets"),
            volume: 80,
        });
        engine.apply(EngineCmd::SetTimerDuration(60));
        engine.apply(EngineCmd::StartTimer);

        engine.advance_clock(45);
        assert_eq!(engine.mix().get("crickets").unwrap().volume, 40);

        port.clear();
        rx.try_iter().for_each(drop);
        for _ in 0..30 {
            engine.tick();
        }
        assert_eq!(port.count(|op| *op == PortOp::StopAll), 1);
        let mix = engine.mix();
        assert!(mix.paused);
        assert_eq!(mix.get("crickets").unwrap().volume, 80);
        let expiries = rx
            .try_iter()
            .filter(|f| matches!(f, EngineFeedback::TimerExpired))
            .count();
        assert_eq!(expiries, 1);
    }

    #[test]
    fn test_toggle_pause_round_trip() {
        let (port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        port.clear();

        engine.apply(EngineCmd::TogglePause);
        assert_eq!(port.operations(), vec![PortOp::StopAll]);
        engine.apply(EngineCmd::TogglePause);
        assert_eq!(port.count(PortOp::is_play), 1);
        assert!(engine.timer_state().is_running);
    }

    #[test]
    fn test_randomize_is_seeded() {
        let (_port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::Randomize);
        let first = engine.mix();
        assert!((2..=3).contains(&first.len()));

        let (_port, mut other, _rx) = setup();
        other.apply(EngineCmd::Randomize);
        assert_eq!(first.sounds, other.mix().sounds);
    }

    #[test]
    fn test_playback_interruption_pauses() {
        let (port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        port.clear();
        engine.apply(EngineCmd::PlaybackInterrupted);
        engine.apply(EngineCmd::PlaybackInterrupted);
        assert!(engine.mix().paused);
        assert_eq!(port.operations(), vec![PortOp::StopAll]);
    }

    #[test]
    fn test_backend_failure_reported_and_retried() {
        let (port, mut engine, rx) = setup();
        port.fail_next(1);
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        assert!(rx
            .try_iter()
            .any(|f| matches!(f, EngineFeedback::SyncFailed(_))));
        assert!(engine.backend_snapshot().is_empty());

        engine.apply(EngineCmd::AddSound(SoundId::new("small-campfire")));
        assert_eq!(port.count(PortOp::is_play), 2);
        assert_eq!(engine.backend_snapshot().len(), 2);
    }

    #[test]
    fn test_shutdown_stops_all() {
        let (port, mut engine, _rx) = setup();
        engine.apply(EngineCmd::AddSound(SoundId::new("crickets")));
        port.clear();
        assert!(engine.apply(EngineCmd::Shutdown));
        assert_eq!(port.operations(), vec![PortOp::StopAll]);
    }
}
