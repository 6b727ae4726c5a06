#![allow(dead_code)]
//! Test harness utilities for nocturne-core integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::Receiver;

use nocturne_audio::{AudioPort, PortOp, TestPort};
use nocturne_core::{Config, Engine, EngineFeedback, MemoryRepository, MixHandle};

/// Timer settings that keep fades out of the way unless a test wants them.
pub const NO_FADE: &str = "[timer]\nfade_out_seconds = 0\nauto_start_on_add = false\n";

pub fn config(toml: &str) -> Config {
    Config::from_toml_str(toml).unwrap()
}

/// A synchronous engine on `port` with an in-memory repository.
pub fn make_engine(port: Arc<dyn AudioPort>, toml: &str) -> (Engine, Receiver<EngineFeedback>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let engine = Engine::new(port, &config(toml), Box::new(MemoryRepository::new()), tx).with_seed(11);
    (engine, rx)
}

/// Engine on a fresh `TestPort`, with the startup master reset cleared.
pub fn make_test_engine(toml: &str) -> (Arc<TestPort>, Engine, Receiver<EngineFeedback>) {
    let port = Arc::new(TestPort::new());
    let (engine, rx) = make_engine(port.clone(), toml);
    port.clear();
    (port, engine, rx)
}

pub fn spawn_handle(port: Arc<dyn AudioPort>, toml: &str) -> MixHandle {
    MixHandle::spawn(port, &config(toml), Box::new(MemoryRepository::new()))
}

pub fn drain(rx: &Receiver<EngineFeedback>) -> Vec<EngineFeedback> {
    rx.try_iter().collect()
}

/// Fixed reference point for suspend/resume tests.
pub fn epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn play_ids(port: &TestPort) -> Vec<String> {
    port.operations()
        .into_iter()
        .filter_map(|op| match op {
            PortOp::Play { id, .. } => Some(id.to_string()),
            _ => None,
        })
        .collect()
}

/// Poll handle feedback until `pred` matches, or panic on timeout.
pub fn wait_for<F>(handle: &mut MixHandle, timeout: Duration, pred: F) -> EngineFeedback
where
    F: Fn(&EngineFeedback) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        let left = timeout.saturating_sub(start.elapsed());
        if let Some(msg) = handle.wait_feedback(left.min(Duration::from_millis(50))) {
            if pred(&msg) {
                return msg;
            }
        }
    }
    panic!("Timed out after {:?} waiting for feedback", timeout);
}

/// Poll the port until `pred` holds, or panic on timeout.
pub fn wait_for_port<F>(port: &TestPort, timeout: Duration, pred: F)
where
    F: Fn(&[PortOp]) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pred(&port.operations()) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out waiting for port operations: {:?}", port.operations());
}
