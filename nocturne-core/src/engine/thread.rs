//! Engine thread: commands and the one-second timer tick, selected together.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};

use super::{Engine, EngineCmd};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const MAX_DRAIN: usize = 64;

pub(super) struct EngineThread {
    engine: Engine,
    cmd_rx: Receiver<EngineCmd>,
    /// Wall time already handed to the timer, in whole seconds.
    last_tick: Instant,
}

impl EngineThread {
    pub(super) fn new(engine: Engine, cmd_rx: Receiver<EngineCmd>) -> Self {
        Self {
            engine,
            cmd_rx,
            last_tick: Instant::now(),
        }
    }

    pub(super) fn run(mut self) {
        let ticker = crossbeam_channel::tick(TICK_INTERVAL);
        loop {
            crossbeam_channel::select! {
                recv(self.cmd_rx) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => {
                            // Handle dropped without a shutdown.
                            self.engine.terminate();
                            break;
                        }
                    }
                }
                recv(ticker) -> _ => self.tick(),
            }

            if self.drain_commands() {
                break;
            }
            self.engine.pump();
        }
        log::debug!(target: "engine", "engine thread exiting");
    }

    /// Handle whatever else is queued so a burst reconciles once.
    fn drain_commands(&mut self) -> bool {
        for _ in 0..MAX_DRAIN {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    self.engine.terminate();
                    return true;
                }
            }
        }
        false
    }

    fn handle_cmd(&mut self, cmd: EngineCmd) -> bool {
        // Resume accounts for the suspended interval by wall clock.
        let resumed = matches!(cmd, EngineCmd::Resume);
        let quit = self.engine.handle(cmd);
        if resumed {
            self.last_tick = Instant::now();
        }
        quit
    }

    /// Hand whole elapsed seconds to the timer, keeping the remainder so
    /// late ticks do not drift the countdown.
    fn tick(&mut self) {
        let whole = self.last_tick.elapsed().as_secs();
        if whole == 0 {
            return;
        }
        self.last_tick += Duration::from_secs(whole);
        self.engine
            .advance_clock(u32::try_from(whole).unwrap_or(u32::MAX));
    }
}
