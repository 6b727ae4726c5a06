//! Background playback service backend.
//!
//! The service is a separate, independently scheduled player (on mobile, a
//! foreground service) that keeps its own countdown while this process is
//! frozen. `ServicePort` turns port calls into serialisable requests and
//! hands them to a host-provided `ServiceTransport`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use nocturne_types::{SoundId, SoundRegistry};

use crate::bridge::{packet_for, BridgePacket};
use crate::port::{AudioPort, PortError, PortResult, ServiceStatus};

/// One request to the playback service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServiceRequest {
    Play { packet: BridgePacket, volume: f32 },
    #[serde(rename_all = "camelCase")]
    SetVolume { sound_id: String, volume: f32 },
    #[serde(rename_all = "camelCase")]
    Stop { sound_id: String },
    StopAll,
    SetMasterVolume { volume: f32 },
    ArmTimer { seconds: u32 },
    CancelTimer,
}

/// Channel to the service process. Implemented by the host platform.
pub trait ServiceTransport: Send + Sync {
    fn send(&self, request: &ServiceRequest) -> PortResult;

    fn status(&self) -> PortResult<ServiceStatus>;
}

pub struct ServicePort<T: ServiceTransport> {
    transport: T,
    registry: SoundRegistry,
}

impl<T: ServiceTransport> ServicePort<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            registry: SoundRegistry::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: ServiceTransport> AudioPort for ServicePort<T> {
    fn play_sound(&self, id: &SoundId, volume: f32) -> PortResult {
        let packet = packet_for(&self.registry, id.as_str())
            .ok_or_else(|| PortError(format!("unknown sound: {id}")))?;
        self.transport.send(&ServiceRequest::Play {
            packet,
            volume: volume.clamp(0.0, 1.0),
        })
    }

    fn stop_sound(&self, id: &SoundId) -> PortResult {
        self.transport.send(&ServiceRequest::Stop {
            sound_id: id.to_string(),
        })
    }

    fn set_volume(&self, id: &SoundId, volume: f32) -> PortResult {
        self.transport.send(&ServiceRequest::SetVolume {
            sound_id: id.to_string(),
            volume: volume.clamp(0.0, 1.0),
        })
    }

    fn stop_all(&self) -> PortResult {
        self.transport.send(&ServiceRequest::StopAll)
    }

    fn set_master_volume(&self, volume: f32) -> PortResult {
        self.transport.send(&ServiceRequest::SetMasterVolume {
            volume: volume.clamp(0.0, 1.0),
        })
    }

    fn service_status(&self) -> PortResult<Option<ServiceStatus>> {
        self.transport.status().map(Some)
    }

    fn arm_timer(&self, seconds: u32) -> PortResult {
        self.transport.send(&ServiceRequest::ArmTimer { seconds })
    }

    fn cancel_timer(&self) -> PortResult {
        self.transport.send(&ServiceRequest::CancelTimer)
    }

    fn name(&self) -> &'static str {
        "service"
    }
}

// ─── Loopback Service ───────────────────────────────────────────────

#[derive(Default)]
struct LoopbackState {
    playing: BTreeMap<String, f32>,
    master: f32,
    deadline: Option<Instant>,
    requests: Vec<ServiceRequest>,
}

/// In-memory stand-in for the service process.
///
/// Keeps a wall-clock countdown of its own and silences everything when it
/// runs out, whether or not anyone is polling.
#[derive(Default)]
pub struct LoopbackService {
    state: Mutex<LoopbackState>,
}

impl LoopbackService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState {
                master: 1.0,
                ..LoopbackState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Self::expire_if_due(&mut state, Instant::now());
        state
    }

    fn expire_if_due(state: &mut LoopbackState, now: Instant) {
        if state.deadline.is_some_and(|d| d <= now) {
            log::info!(target: "backend", "loopback service countdown finished");
            state.deadline = None;
            state.playing.clear();
        }
    }

    /// Sounds currently playing, with their volumes.
    pub fn playing(&self) -> BTreeMap<String, f32> {
        self.lock().playing.clone()
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.lock().requests.clone()
    }

    /// Move the countdown as if `elapsed` passed while nobody was looking.
    pub fn elapse(&self, elapsed: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(deadline) = state.deadline {
            state.deadline = Some(deadline.checked_sub(elapsed).unwrap_or_else(Instant::now));
        }
        Self::expire_if_due(&mut state, Instant::now());
    }
}

impl ServiceTransport for LoopbackService {
    fn send(&self, request: &ServiceRequest) -> PortResult {
        let mut state = self.lock();
        match request {
            ServiceRequest::Play { packet, volume } => {
                state.playing.insert(packet.sound_id.clone(), *volume);
            }
            ServiceRequest::SetVolume { sound_id, volume } => {
                match state.playing.get_mut(sound_id) {
                    Some(v) => *v = *volume,
                    None => return Err(PortError(format!("{sound_id} is not playing"))),
                }
            }
            ServiceRequest::Stop { sound_id } => {
                state.playing.remove(sound_id);
            }
            ServiceRequest::StopAll => state.playing.clear(),
            ServiceRequest::SetMasterVolume { volume } => state.master = *volume,
            ServiceRequest::ArmTimer { seconds } => {
                state.deadline = Some(Instant::now() + Duration::from_secs(u64::from(*seconds)));
            }
            ServiceRequest::CancelTimer => state.deadline = None,
        }
        state.requests.push(request.clone());
        Ok(())
    }

    fn status(&self) -> PortResult<ServiceStatus> {
        let state = self.lock();
        Ok(match state.deadline {
            Some(deadline) => ServiceStatus {
                is_running: true,
                time_left: remaining_secs(deadline, Instant::now()),
            },
            None => ServiceStatus {
                is_running: false,
                time_left: 0,
            },
        })
    }
}

/// Whole seconds left, rounded up so a running countdown never reads zero.
fn remaining_secs(deadline: Instant, now: Instant) -> u32 {
    let left = deadline.saturating_duration_since(now);
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> ServicePort<LoopbackService> {
        ServicePort::new(LoopbackService::new())
    }

    #[test]
    fn test_requests_carry_bridge_packets() {
        let port = port();
        port.play_sound(&SoundId::new("brown-noise"), 0.6).unwrap();
        let requests = port.transport().requests();
        match &requests[0] {
            ServiceRequest::Play { packet, volume } => {
                assert_eq!(packet.url, "synthetic://brown");
                assert_eq!(*volume, 0.6);
            }
            other => panic!("unexpected request {other:?}"),
        }
        let json = serde_json::to_value(&requests[0]).unwrap();
        assert_eq!(json["op"], "play");
        assert_eq!(json["packet"]["soundId"], "brown-noise");
    }

    #[test]
    fn test_unknown_sound_rejected() {
        assert!(port().play_sound(&SoundId::new("nope"), 0.5).is_err());
    }

    #[test]
    fn test_playback_and_stop() {
        let port = port();
        port.play_sound(&SoundId::new("crickets"), 0.5).unwrap();
        port.play_sound(&SoundId::new("fireplace"), 0.5).unwrap();
        port.set_volume(&SoundId::new("crickets"), 0.2).unwrap();
        port.stop_sound(&SoundId::new("fireplace")).unwrap();
        assert_eq!(port.transport().playing().get("crickets"), Some(&0.2));
        assert_eq!(port.transport().playing().len(), 1);
        assert!(port.set_volume(&SoundId::new("fireplace"), 0.2).is_err());
        port.stop_all().unwrap();
        assert!(port.transport().playing().is_empty());
    }

    #[test]
    fn test_countdown_runs_independently() {
        let port = port();
        assert_eq!(
            port.service_status().unwrap(),
            Some(ServiceStatus {
                is_running: false,
                time_left: 0
            })
        );
        port.play_sound(&SoundId::new("crickets"), 0.5).unwrap();
        port.arm_timer(600).unwrap();
        let status = port.service_status().unwrap().unwrap();
        assert!(status.is_running);
        assert!(status.time_left > 595 && status.time_left <= 600);

        port.transport().elapse(Duration::from_secs(200));
        let status = port.service_status().unwrap().unwrap();
        assert!(status.time_left <= 400);

        port.transport().elapse(Duration::from_secs(500));
        let status = port.service_status().unwrap().unwrap();
        assert!(!status.is_running);
        assert_eq!(status.time_left, 0);
        assert!(port.transport().playing().is_empty());
    }

    #[test]
    fn test_cancel_timer() {
        let port = port();
        port.arm_timer(60).unwrap();
        port.cancel_timer().unwrap();
        assert!(!port.service_status().unwrap().unwrap().is_running);
    }
}
