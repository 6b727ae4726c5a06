//! Sleep timer orchestration: drives `SleepTimerState` and mirrors the
//! countdown onto backends that can keep one while we are suspended.

use std::sync::Arc;

use nocturne_audio::AudioPort;
use nocturne_types::{MixState, SleepTimerState, SoundId, TimerPhase};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The countdown reached zero. Fired once per countdown.
    Expired,
    /// Remaining time was corrected from the backend.
    Adjusted { time_left: u32 },
}

pub struct TimerOrchestrator {
    state: SleepTimerState,
    port: Arc<dyn AudioPort>,
    fade_seconds: u32,
    /// The backend accepted our last `arm_timer` and has not been cancelled.
    backend_armed: bool,
}

impl TimerOrchestrator {
    pub fn new(port: Arc<dyn AudioPort>, selected_seconds: u32, fade_seconds: u32) -> Self {
        Self {
            state: SleepTimerState::with_selected(selected_seconds),
            port,
            fade_seconds,
            backend_armed: false,
        }
    }

    pub fn state(&self) -> &SleepTimerState {
        &self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase()
    }

    /// Arm a countdown without starting it; zero disables the timer.
    pub fn set_duration(&mut self, seconds: u32) {
        self.state.set_duration(seconds);
        self.disarm_backend();
        log::info!(target: "timer", "duration set to {}s", self.state.total_time);
    }

    /// Start or resume. No-op with no active sounds.
    pub fn start(&mut self, active_count: usize) -> bool {
        if active_count == 0 || !self.state.start() {
            return false;
        }
        self.arm_backend();
        true
    }

    /// Re-arm to the full selected duration and run.
    pub fn restart(&mut self, active_count: usize) -> bool {
        if active_count == 0 || !self.state.restart() {
            return false;
        }
        self.arm_backend();
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.state.pause() {
            return false;
        }
        self.disarm_backend();
        true
    }

    pub fn tick(&mut self) -> Option<TimerEvent> {
        self.advance(1)
    }

    /// Account for `seconds` of elapsed wall time.
    pub fn advance(&mut self, seconds: u32) -> Option<TimerEvent> {
        if self.state.advance(seconds) {
            self.backend_armed = false;
            log::info!(target: "timer", "sleep timer expired");
            return Some(TimerEvent::Expired);
        }
        None
    }

    /// Reconcile with the backend's own countdown.
    ///
    /// A backend that reports expiry wins over the local clock, and a smaller
    /// backend remainder is adopted. The local countdown is never moved
    /// backwards. Errors leave local state untouched.
    pub fn sync_from_native(&mut self) -> Result<Option<TimerEvent>, EngineError> {
        if self.phase() != TimerPhase::Running {
            return Ok(None);
        }
        let status = match self.port.service_status() {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!(target: "timer", "status query failed, keeping local clock: {}", e);
                return Err(EngineError::SyncUnavailable(e));
            }
        };

        if !status.is_running && status.time_left == 0 {
            if !self.backend_armed {
                log::debug!(target: "timer", "backend has no countdown, re-arming");
                self.arm_backend();
                return Ok(None);
            }
            self.state.expire();
            self.backend_armed = false;
            log::info!(target: "timer", "backend reports expiry");
            return Ok(Some(TimerEvent::Expired));
        }

        let before = self.state.time_left;
        if self.state.adopt_remaining(status.time_left) {
            self.backend_armed = false;
            return Ok(Some(TimerEvent::Expired));
        }
        if self.state.time_left != before {
            log::info!(
                target: "timer",
                "adopted backend countdown: {}s -> {}s",
                before,
                self.state.time_left
            );
            return Ok(Some(TimerEvent::Adjusted {
                time_left: self.state.time_left,
            }));
        }
        Ok(None)
    }

    /// Fraction of each captured volume to play at, inside the fade window.
    pub fn fade_factor(&self) -> Option<f32> {
        self.state.fade_factor(self.fade_seconds)
    }

    /// Remember the current volumes as the ones to restore after a fade.
    pub fn capture_defaults(&mut self, mix: &MixState) {
        self.state.sound_defaults = mix.sounds.iter().map(|s| (s.id.clone(), s.volume)).collect();
    }

    pub fn record_default(&mut self, id: &SoundId, volume: u8) {
        self.state.sound_defaults.insert(id.clone(), volume);
    }

    pub fn forget_default(&mut self, id: &str) {
        self.state.sound_defaults.remove(id);
    }

    /// Write the captured volumes back into `mix`.
    pub fn restore_defaults(&self, mix: &mut MixState) {
        self.state.restore_defaults(&mut mix.sounds);
    }

    /// Scale the captured volumes in `mix` by the current fade factor.
    pub fn apply_fade(&self, mix: &mut MixState) -> bool {
        let Some(factor) = self.fade_factor() else {
            return false;
        };
        for sound in &mut mix.sounds {
            if let Some(volume) = self.state.sound_defaults.get(&sound.id) {
                sound.volume = (f32::from(*volume) * factor).round() as u8;
            }
        }
        true
    }

    fn arm_backend(&mut self) {
        match self.port.arm_timer(self.state.time_left) {
            Ok(()) => self.backend_armed = true,
            Err(e) => {
                self.backend_armed = false;
                log::warn!(target: "timer", "backend countdown not armed: {}", e);
            }
        }
    }

    fn disarm_backend(&mut self) {
        self.backend_armed = false;
        if let Err(e) = self.port.cancel_timer() {
            log::warn!(target: "timer", "backend countdown not cancelled: {}", e);
        }
    }
}
