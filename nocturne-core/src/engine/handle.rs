//! MixHandle: main-thread interface to the engine.
//!
//! Owns the command/feedback channels and the read state the engine thread
//! is the authority on.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use nocturne_audio::AudioPort;
use nocturne_types::{encode_mix, MixState, SleepTimerState};

use super::thread::EngineThread;
use super::{Engine, EngineCmd, EngineFeedback};
use crate::config::Config;
use crate::saved_mixes::{MixRepository, SavedMix};

/// Engine-owned state mirrored on the main thread from feedback.
#[derive(Debug, Clone, Default)]
pub struct MixReadState {
    pub mix: Arc<MixState>,
    pub timer: SleepTimerState,
    pub saved: Vec<SavedMix>,
    pub timer_expired: bool,
}

impl MixReadState {
    /// Share string for the mix at the volumes the user set, not the faded ones.
    pub fn share_link(&self) -> String {
        let mut sounds = self.mix.sounds.clone();
        self.timer.restore_defaults(&mut sounds);
        encode_mix(&sounds)
    }
}

pub struct MixHandle {
    cmd_tx: Sender<EngineCmd>,
    feedback_rx: Receiver<EngineFeedback>,
    read_state: MixReadState,
    join_handle: Option<JoinHandle<()>>,
}

impl MixHandle {
    /// Build an engine on `port` and start its thread.
    pub fn spawn(port: Arc<dyn AudioPort>, config: &Config, repo: Box<dyn MixRepository>) -> Self {
        let (feedback_tx, feedback_rx) = crossbeam_channel::unbounded();
        let engine = Engine::new(port, config, repo, feedback_tx);
        Self::with_engine(engine, feedback_rx)
    }

    /// Start the thread for an already-built engine.
    pub fn with_engine(engine: Engine, feedback_rx: Receiver<EngineFeedback>) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let read_state = MixReadState {
            mix: engine.mix(),
            timer: engine.timer_state().clone(),
            ..Default::default()
        };
        let join_handle = thread::spawn(move || {
            EngineThread::new(engine, cmd_rx).run();
        });
        Self {
            cmd_tx,
            feedback_rx,
            read_state,
            join_handle: Some(join_handle),
        }
    }

    pub fn send_cmd(&self, cmd: EngineCmd) -> Result<(), String> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| "Engine thread disconnected".to_string())
    }

    /// Fire-and-forget: send a command and log if the engine thread is gone.
    pub fn send(&self, cmd: EngineCmd) {
        if let Err(e) = self.send_cmd(cmd) {
            log::warn!(target: "engine", "command dropped: {}", e);
        }
    }

    pub fn drain_feedback(&mut self) -> Vec<EngineFeedback> {
        let mut out = Vec::new();
        while let Ok(msg) = self.feedback_rx.try_recv() {
            self.apply_feedback(&msg);
            out.push(msg);
        }
        out
    }

    /// Block up to `timeout` for the next feedback message.
    pub fn wait_feedback(&mut self, timeout: Duration) -> Option<EngineFeedback> {
        let msg = self.feedback_rx.recv_timeout(timeout).ok()?;
        self.apply_feedback(&msg);
        Some(msg)
    }

    fn apply_feedback(&mut self, feedback: &EngineFeedback) {
        match feedback {
            EngineFeedback::MixChanged(mix) => {
                self.read_state.mix = Arc::clone(mix);
            }
            EngineFeedback::TimerChanged(timer) => {
                self.read_state.timer = timer.clone();
            }
            EngineFeedback::TimerExpired => {
                self.read_state.timer_expired = true;
            }
            EngineFeedback::SavedMixes(list) => {
                self.read_state.saved = list.clone();
            }
            EngineFeedback::CapacityReached { .. } => {}
            EngineFeedback::SyncFailed(_) => {}
            EngineFeedback::DecodeFailure(_) => {}
            EngineFeedback::Error(_) => {}
        }
    }

    pub fn read_state(&self) -> &MixReadState {
        &self.read_state
    }

    /// Stop playback and join the engine thread.
    pub fn shutdown(&mut self) {
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        self.send(EngineCmd::Shutdown);
        if join_handle.join().is_err() {
            log::error!(target: "engine", "engine thread panicked");
        }
    }
}

impl Drop for MixHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
