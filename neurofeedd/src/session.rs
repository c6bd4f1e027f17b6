//! Feed sessions: one subscriber's timer, parameters and step counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use neurofeed::{build_frame, AreaLayout, ConfigUpdate, Prng, SimulationConfig, ValidationError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::SubscriberChannel;
use crate::feed::{FrameSource, PeriodicFeed};
use crate::protocol::{Inbound, Outbound, StatusReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// Generates one frame per tick from the session's live parameters.
struct Simulation {
    layout: Arc<AreaLayout>,
    config: watch::Receiver<SimulationConfig>,
    step: Arc<AtomicU64>,
    rng: Prng,
}

impl FrameSource for Simulation {
    fn next_event(&mut self) -> Option<Outbound> {
        let config = self.config.borrow().clone();
        let done = self.step.load(Ordering::SeqCst);
        if config.max_steps.is_some_and(|max| done >= max) {
            return None;
        }

        let step = done + 1;
        match build_frame(&self.layout, &config, step, &mut self.rng) {
            Ok(frame) => {
                self.step.store(step, Ordering::SeqCst);
                Some(Outbound::NewActivity(frame))
            }
            Err(e) => {
                // Parameters are validated before they reach the receiver.
                warn!("Frame generation failed at step {}: {}", step, e);
                Some(Outbound::error(format!("Frame generation failed: {e}")))
            }
        }
    }

    fn finished(&mut self) -> Option<Outbound> {
        let steps = self.step.load(Ordering::SeqCst);
        info!("Simulation finished after {} steps", steps);
        Some(Outbound::info(format!(
            "Simulation finished after {steps} steps"
        )))
    }
}

pub struct FeedSession {
    id: u64,
    channel: Arc<dyn SubscriberChannel>,
    layout: Arc<AreaLayout>,
    config: watch::Sender<SimulationConfig>,
    step: Arc<AtomicU64>,
    feed: PeriodicFeed,
}

impl FeedSession {
    pub fn new(
        id: u64,
        channel: Arc<dyn SubscriberChannel>,
        layout: Arc<AreaLayout>,
        config: SimulationConfig,
    ) -> Self {
        let (config, _) = watch::channel(config);
        Self {
            id,
            channel,
            layout,
            config,
            step: Arc::new(AtomicU64::new(0)),
            feed: PeriodicFeed::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.feed.is_running() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn step(&self) -> u64 {
        self.step.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> SimulationConfig {
        self.config.borrow().clone()
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.config.borrow().step_duration)
    }

    /// Starts the timer, replacing a running one. Returns the interval used.
    pub fn start(&mut self) -> Duration {
        let interval = self.step_duration();
        let source = Simulation {
            layout: Arc::clone(&self.layout),
            config: self.config.subscribe(),
            step: Arc::clone(&self.step),
            rng: Prng::from_entropy(),
        };
        self.feed.start(Arc::clone(&self.channel), interval, source);
        interval
    }

    /// Returns whether a timer was running.
    pub fn stop(&mut self) -> bool {
        self.feed.stop()
    }

    pub fn reset(&mut self) {
        self.feed.stop();
        self.step.store(0, Ordering::SeqCst);
    }

    /// Validates and applies `update`; a running feed picks the new values up
    /// on its next tick and is restarted if the interval changed.
    pub fn update_config(&mut self, update: &ConfigUpdate) -> Result<Vec<String>, ValidationError> {
        let mut next = self.config();
        let previous_interval = next.step_duration;
        let recognised = next.apply(update)?;
        let interval_changed = next.step_duration != previous_interval;
        self.config.send_replace(next);

        if interval_changed && self.state() == SessionState::Running {
            self.start();
        }
        Ok(recognised)
    }

    /// The configured step limit, if the counter has already reached it.
    fn exhausted_limit(&self) -> Option<u64> {
        let max = self.config.borrow().max_steps?;
        (self.step() >= max).then_some(max)
    }

    pub fn status(&self) -> StatusReport {
        let config = self.config();
        StatusReport {
            running: self.state() == SessionState::Running,
            step: self.step(),
            step_duration: config.step_duration,
            config,
        }
    }

    /// Executes a control request and returns the reply for the requester.
    pub fn handle(&mut self, request: Inbound) -> Outbound {
        match request {
            Inbound::StartSimulation(update) => {
                if !update.is_empty() {
                    if let Err(e) = self.update_config(&update) {
                        warn!("Session {}: rejected start parameters: {}", self.id, e);
                        return Outbound::error(format!("Invalid start parameters: {e}"));
                    }
                }
                if let Some(max) = self.exhausted_limit() {
                    debug!("Session {}: start refused, step limit {} reached", self.id, max);
                    return Outbound::error(format!(
                        "Step limit of {max} already reached; send reset-simulation to start over"
                    ));
                }
                let restarted = self.state() == SessionState::Running;
                let interval = self.start();
                info!(
                    "Session {}: simulation {} every {} ms at step {}",
                    self.id,
                    if restarted { "restarted" } else { "started" },
                    interval.as_millis(),
                    self.step()
                );
                Outbound::info(format!(
                    "Simulation {} (every {} ms)",
                    if restarted { "restarted" } else { "started" },
                    interval.as_millis()
                ))
            }
            Inbound::StopSimulation => {
                if self.stop() {
                    info!("Session {}: simulation stopped at step {}", self.id, self.step());
                    Outbound::info(format!("Simulation stopped at step {}", self.step()))
                } else {
                    debug!("Session {}: stop requested while idle", self.id);
                    Outbound::info("Simulation is not running")
                }
            }
            Inbound::ResetSimulation => {
                self.reset();
                info!("Session {}: simulation reset", self.id);
                Outbound::info("Simulation reset")
            }
            Inbound::UpdateConfig(update) => {
                if update.is_empty() {
                    return Outbound::info("No parameters to update");
                }
                match self.update_config(&update) {
                    Ok(recognised) => {
                        let keys: Vec<&str> = update.keys().collect();
                        info!("Session {}: config updated ({})", self.id, keys.join(", "));
                        if recognised.is_empty() {
                            Outbound::info(format!("Config received: {}", keys.join(", ")))
                        } else {
                            Outbound::info(format!("Config updated: {}", keys.join(", ")))
                        }
                    }
                    Err(e) => {
                        warn!("Session {}: rejected config update: {}", self.id, e);
                        Outbound::error(format!("Invalid config: {e}"))
                    }
                }
            }
            Inbound::GetStatus => Outbound::Status(self.status()),
        }
    }
}
