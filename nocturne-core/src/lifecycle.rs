//! Suspend/resume/terminate bookkeeping.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use nocturne_audio::AudioPort;

pub struct LifecycleCoordinator {
    suspended_at: Option<SystemTime>,
    grace: Duration,
}

impl LifecycleCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            suspended_at: None,
            grace,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Record the suspension time. A second suspend keeps the first stamp.
    pub fn suspend(&mut self, now: SystemTime) {
        if self.suspended_at.is_none() {
            log::info!(target: "lifecycle", "suspended");
            self.suspended_at = Some(now);
        }
    }

    /// Whole seconds spent suspended. Zero if we were not suspended or the
    /// wall clock went backwards.
    pub fn resume(&mut self, now: SystemTime) -> u32 {
        let Some(since) = self.suspended_at.take() else {
            return 0;
        };
        let elapsed = now.duration_since(since).unwrap_or(Duration::ZERO);
        let secs = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
        log::info!(target: "lifecycle", "resumed after {}s", secs);
        secs
    }

    /// Best-effort `stop_all` bounded by the grace period. Returns whether
    /// the backend acknowledged in time.
    pub fn terminate(&self, port: Arc<dyn AudioPort>) -> bool {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = thread::Builder::new()
            .name("nocturne-teardown".into())
            .spawn(move || {
                let _ = tx.send(port.stop_all());
            });
        if let Err(e) = spawned {
            log::warn!(target: "lifecycle", "teardown thread not started: {}", e);
            return false;
        }
        match rx.recv_timeout(self.grace) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::warn!(target: "lifecycle", "stop-all at teardown failed: {}", e);
                false
            }
            Err(_) => {
                log::warn!(
                    target: "lifecycle",
                    "stop-all at teardown still pending after {:?}, giving up",
                    self.grace
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocturne_audio::{PortOp, PortResult, ServiceStatus, TestPort};
    use nocturne_types::SoundId;

    #[test]
    fn test_resume_reports_elapsed() {
        let mut lifecycle = LifecycleCoordinator::new(Duration::from_millis(100));
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        lifecycle.suspend(t0);
        lifecycle.suspend(t0 + Duration::from_secs(50));
        assert!(lifecycle.is_suspended());
        assert_eq!(lifecycle.resume(t0 + Duration::from_millis(125_900)), 125);
        assert!(!lifecycle.is_suspended());
        assert_eq!(lifecycle.resume(t0 + Duration::from_secs(500)), 0);
    }

    #[test]
    fn test_clock_going_backwards_is_zero() {
        let mut lifecycle = LifecycleCoordinator::new(Duration::from_millis(100));
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        lifecycle.suspend(t0);
        assert_eq!(lifecycle.resume(t0 - Duration::from_secs(30)), 0);
    }

    #[test]
    fn test_terminate_stops_all() {
        let port = Arc::new(TestPort::new());
        let lifecycle = LifecycleCoordinator::new(Duration::from_secs(2));
        assert!(lifecycle.terminate(port.clone()));
        assert_eq!(port.operations(), vec![PortOp::StopAll]);
    }

    struct StuckPort;

    impl AudioPort for StuckPort {
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
            thread::sleep(Duration::from_secs(2));
            Ok(())
        }
        fn set_master_volume(&self, _volume: f32) -> PortResult {
            Ok(())
        }
        fn service_status(&self) -> PortResult<Option<ServiceStatus>> {
            Ok(None)
        }
        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    #[test]
    fn test_terminate_does_not_block_on_slow_backend() {
        let lifecycle = LifecycleCoordinator::new(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert!(!lifecycle.terminate(Arc::new(StuckPort)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
