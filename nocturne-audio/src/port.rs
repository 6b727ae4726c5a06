//! Audio port: the capability boundary between reconciliation and a backend.
//!
//! `AudioPort` speaks in the vocabulary of the mix (play this sound at this
//! level, stop that one) and says nothing about how audio is produced. The
//! in-process synthesizer and the background playback service both sit
//! behind it, and `TestPort` records calls so reconciliation can be checked
//! without any audio device.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use nocturne_types::{AudioCommand, SoundId};

/// Result type for port operations.
pub type PortResult<T = ()> = Result<T, PortError>;

/// Error from a port operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PortError(pub String);

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PortError {}

impl From<std::io::Error> for PortError {
    fn from(e: std::io::Error) -> Self {
        PortError(e.to_string())
    }
}

impl From<String> for PortError {
    fn from(s: String) -> Self {
        PortError(s)
    }
}

impl From<&str> for PortError {
    fn from(s: &str) -> Self {
        PortError(s.to_string())
    }
}

/// Countdown maintained by the backend itself, if it keeps one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub is_running: bool,
    pub time_left: u32,
}

/// Semantic-level playback interface. Volumes are linear in 0.0..=1.0.
pub trait AudioPort: Send + Sync {
    fn play_sound(&self, id: &SoundId, volume: f32) -> PortResult;

    fn stop_sound(&self, id: &SoundId) -> PortResult;

    fn set_volume(&self, id: &SoundId, volume: f32) -> PortResult;

    fn stop_all(&self) -> PortResult;

    fn set_master_volume(&self, volume: f32) -> PortResult;

    /// Backend-side countdown. `None` when the backend does not keep one.
    fn service_status(&self) -> PortResult<Option<ServiceStatus>>;

    /// Hand a countdown to the backend so it keeps running while this
    /// process is suspended.
    fn arm_timer(&self, _seconds: u32) -> PortResult {
        Ok(())
    }

    fn cancel_timer(&self) -> PortResult {
        Ok(())
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Apply one protocol command.
    fn dispatch(&self, command: &AudioCommand) -> PortResult {
        match command {
            AudioCommand::PlaySound { id, volume } => self.play_sound(id, *volume),
            AudioCommand::AdjustVolume { id, volume } => self.set_volume(id, *volume),
            AudioCommand::StopSound { id } => self.stop_sound(id),
            AudioCommand::StopAll => self.stop_all(),
        }
    }
}

// ─── Null Port ──────────────────────────────────────────────────────

/// Port that accepts everything and plays nothing.
#[derive(Debug, Default)]
pub struct NullPort;

impl AudioPort for NullPort {
    fn play_sound(&self, _id: &SoundId, _volume: f32) -> PortResult {
        Ok(())
    }

    fn stop_sound(&self, _id: &SoundId) -> PortResult {
        Ok(())
    }

    fn set_volume(&self, _id: &SoundId, _volume: f32) -> PortResult {
        Ok(())
    }

    fn stop_all(&self) -> PortResult {
        Ok(())
    }

    fn set_master_volume(&self, _volume: f32) -> PortResult {
        Ok(())
    }

    fn service_status(&self) -> PortResult<Option<ServiceStatus>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

// ─── Test Port ──────────────────────────────────────────────────────

/// An operation recorded by `TestPort` for assertion in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum PortOp {
    Play { id: SoundId, volume: f32 },
    Stop(SoundId),
    SetVolume { id: SoundId, volume: f32 },
    StopAll,
    SetMaster(f32),
    ArmTimer(u32),
    CancelTimer,
}

impl PortOp {
    pub fn is_play(&self) -> bool {
        matches!(self, PortOp::Play { .. })
    }
}

#[derive(Default)]
struct TestPortState {
    ops: Vec<PortOp>,
    fail_next: usize,
    fail_all: bool,
    fail_ids: Vec<SoundId>,
    status: Option<ServiceStatus>,
    status_fails: bool,
    status_script: VecDeque<ServiceStatus>,
}

/// Port that records every operation.
///
/// Failed operations are not recorded. Uses `Mutex` so the port is
/// `Send + Sync` and can be shared as `Arc<TestPort>`.
#[derive(Default)]
pub struct TestPort {
    state: Mutex<TestPortState>,
}

impl TestPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TestPortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<PortOp> {
        self.lock().ops.clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.lock().ops.clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&PortOp) -> bool>(&self, f: F) -> usize {
        self.lock().ops.iter().filter(|op| f(op)).count()
    }

    /// Find the first operation matching a predicate.
    pub fn find<F: Fn(&PortOp) -> bool>(&self, f: F) -> Option<PortOp> {
        self.lock().ops.iter().find(|op| f(op)).cloned()
    }

    /// Fail the next `n` playback operations.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Fail every playback operation until turned off.
    pub fn fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Fail play/adjust/stop for one sound id.
    pub fn fail_sound(&self, id: impl Into<SoundId>) {
        self.lock().fail_ids.push(id.into());
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.fail_all = false;
        state.fail_ids.clear();
        state.status_fails = false;
    }

    /// Status the port reports until changed. `None` means no backend countdown.
    pub fn set_status(&self, status: Option<ServiceStatus>) {
        self.lock().status = status;
    }

    /// Queue statuses returned once each before falling back to `set_status`.
    pub fn script_status(&self, statuses: impl IntoIterator<Item = ServiceStatus>) {
        self.lock().status_script.extend(statuses);
    }

    pub fn fail_status(&self, fail: bool) {
        self.lock().status_fails = fail;
    }

    fn record(&self, op: PortOp) -> PortResult {
        let mut state = self.lock();
        let targeted = match &op {
            PortOp::Play { id, .. } | PortOp::SetVolume { id, .. } | PortOp::Stop(id) => {
                state.fail_ids.contains(id)
            }
            _ => false,
        };
        if state.fail_all || targeted {
            return Err(PortError(format!("injected failure: {op:?}")));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PortError(format!("injected failure: {op:?}")));
        }
        state.ops.push(op);
        Ok(())
    }
}

impl AudioPort for TestPort {
    fn play_sound(&self, id: &SoundId, volume: f32) -> PortResult {
        self.record(PortOp::Play {
            id: id.clone(),
            volume,
        })
    }

    fn stop_sound(&self, id: &SoundId) -> PortResult {
        self.record(PortOp::Stop(id.clone()))
    }

    fn set_volume(&self, id: &SoundId, volume: f32) -> PortResult {
        self.record(PortOp::SetVolume {
            id: id.clone(),
            volume,
        })
    }

    fn stop_all(&self) -> PortResult {
        self.record(PortOp::StopAll)
    }

    fn set_master_volume(&self, volume: f32) -> PortResult {
        self.record(PortOp::SetMaster(volume))
    }

    fn service_status(&self) -> PortResult<Option<ServiceStatus>> {
        let mut state = self.lock();
        if state.status_fails {
            return Err(PortError("status unavailable".to_string()));
        }
        if let Some(next) = state.status_script.pop_front() {
            return Ok(Some(next));
        }
        Ok(state.status)
    }

    fn arm_timer(&self, seconds: u32) -> PortResult {
        self.record(PortOp::ArmTimer(seconds))
    }

    fn cancel_timer(&self) -> PortResult {
        self.record(PortOp::CancelTimer)
    }

    fn name(&self) -> &'static str {
        "test"
    }
}
