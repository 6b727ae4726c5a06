//! Sleep timer state and its pure transitions.
//!
//! Side effects (stopping audio, arming a backend countdown) live with the
//! orchestrator in `nocturne-core`; everything here is plain bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mix::ActiveSound;
use crate::SoundId;

/// Longest countdown accepted, in seconds (6 hours).
pub const MAX_TIMER_SECONDS: u32 = 6 * 60 * 60;

/// Durations offered as quick picks, in minutes.
pub const TIMER_PRESETS: [u32; 6] = [15, 30, 60, 120, 240, 480];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    /// No countdown armed (`total_time == 0`).
    Idle,
    Running,
    /// Armed, frozen, remaining time kept.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepTimerState {
    pub total_time: u32,
    pub time_left: u32,
    pub is_running: bool,
    pub selected_time: u32,
    /// Volumes captured before any fade was applied.
    pub sound_defaults: BTreeMap<SoundId, u8>,
}

impl Default for SleepTimerState {
    fn default() -> Self {
        Self::with_selected(15 * 60)
    }
}

impl SleepTimerState {
    pub fn with_selected(seconds: u32) -> Self {
        Self {
            total_time: 0,
            time_left: 0,
            is_running: false,
            selected_time: seconds.min(MAX_TIMER_SECONDS),
            sound_defaults: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> TimerPhase {
        if self.total_time == 0 {
            TimerPhase::Idle
        } else if self.is_running {
            TimerPhase::Running
        } else {
            TimerPhase::Paused
        }
    }

    /// Arm a countdown of `seconds` without starting it. Zero disarms.
    pub fn set_duration(&mut self, seconds: u32) {
        let seconds = seconds.min(MAX_TIMER_SECONDS);
        self.selected_time = seconds;
        self.total_time = seconds;
        self.time_left = seconds;
        self.is_running = false;
    }

    /// Start or resume. From `Idle` the countdown is re-armed from
    /// `selected_time`. Returns whether the state changed.
    pub fn start(&mut self) -> bool {
        match self.phase() {
            TimerPhase::Running => false,
            TimerPhase::Paused => {
                self.is_running = true;
                true
            }
            TimerPhase::Idle => {
                if self.selected_time == 0 {
                    return false;
                }
                self.total_time = self.selected_time;
                self.time_left = self.selected_time;
                self.is_running = true;
                true
            }
        }
    }

    /// Re-arm to the full `selected_time` and run. No-op when nothing is selected.
    pub fn restart(&mut self) -> bool {
        if self.selected_time == 0 {
            return false;
        }
        self.total_time = self.selected_time;
        self.time_left = self.selected_time;
        self.is_running = true;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.phase() != TimerPhase::Running {
            return false;
        }
        self.is_running = false;
        true
    }

    /// One second elapsed. Returns true exactly when this tick expired the timer.
    pub fn tick(&mut self) -> bool {
        self.advance(1)
    }

    /// `seconds` elapsed while running. Returns true when this expired the timer.
    pub fn advance(&mut self, seconds: u32) -> bool {
        if self.phase() != TimerPhase::Running || seconds == 0 {
            return false;
        }
        self.time_left = self.time_left.saturating_sub(seconds);
        if self.time_left == 0 {
            self.expire();
            return true;
        }
        false
    }

    /// Take a remaining time reported elsewhere if it is smaller than ours.
    /// Never moves the countdown backwards. Returns true if that expired it.
    pub fn adopt_remaining(&mut self, seconds: u32) -> bool {
        if self.phase() != TimerPhase::Running || seconds >= self.time_left {
            return false;
        }
        self.time_left = seconds;
        if self.time_left == 0 {
            self.expire();
            return true;
        }
        false
    }

    /// Drop to `Idle`. `selected_time` is kept so the next start re-arms it.
    pub fn expire(&mut self) {
        self.total_time = 0;
        self.time_left = 0;
        self.is_running = false;
    }

    /// Fraction of the captured volume to play at, while inside the fade window.
    pub fn fade_factor(&self, fade_seconds: u32) -> Option<f32> {
        if self.phase() != TimerPhase::Running || fade_seconds == 0 {
            return None;
        }
        (self.time_left < fade_seconds).then(|| self.time_left as f32 / fade_seconds as f32)
    }

    /// Put the captured pre-fade volumes back into `sounds`.
    pub fn restore_defaults(&self, sounds: &mut [ActiveSound]) {
        for sound in sounds {
            if let Some(volume) = self.sound_defaults.get(&sound.id) {
                sound.volume = *volume;
            }
        }
    }
}
