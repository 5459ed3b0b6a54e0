//! Connection state machine.
//!
//! [`ConnectionMachine::handle`] is the only place the connection state
//! changes. It performs no I/O: it returns the [`Effect`]s the driver must
//! carry out. Every asynchronous piece of work (handshake, retry timer,
//! token refresh) is stamped with the generation current when it was started;
//! completions carrying an older generation are ignored.

use super::state::{ConnectionState, ConnectionStatus};
use crate::infrastructure::ReconnectPolicy;
use crate::types::ConnectFailure;
use std::time::Duration;

/// Things that can happen to the connection
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Connect,
    Disconnect,
    Pause,
    Reset,
    ForceReconnect,
    HandshakeSucceeded { generation: u64 },
    HandshakeFailed { generation: u64, failure: ConnectFailure },
    TransportClosed { generation: u64, reason: String },
    RetryElapsed { generation: u64 },
    RefreshSucceeded { generation: u64 },
    RefreshFailed { generation: u64, reason: String },
}

/// Work the driver performs on behalf of the machine, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a handshake tagged with `generation`
    OpenTransport { generation: u64 },
    /// Adopt the link produced by the handshake that just succeeded
    ActivateTransport,
    CloseTransport,
    /// Abort in-flight handshakes, timers and refreshes
    CancelPending,
    ScheduleRetry { generation: u64, delay: Duration },
    RefreshCredentials { generation: u64 },
    /// Join every subscribed topic on the fresh link
    ReplaySubscriptions,
    /// Retry budget used up; tell listeners
    Exhausted {
        attempts: u32,
        last_error: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    attempt: u32,
    generation: u64,
    refreshed_this_cycle: bool,
    last_error: Option<String>,
    exhausted: bool,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            attempt: 0,
            generation: 0,
            refreshed_this_cycle: false,
            last_error: None,
            exhausted: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether this reconnect cycle already spent its token refresh
    pub fn has_refreshed(&self) -> bool {
        self.refreshed_this_cycle
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
            exhausted: self.exhausted,
        }
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        use ConnectionState::*;

        let mut effects = Vec::new();
        match input {
            Input::Connect => match self.state {
                Connecting | Connected | Reconnecting => {}
                Disconnected | Paused => {
                    self.clear_cycle();
                    self.begin_attempt(&mut effects);
                }
            },

            Input::Disconnect => {
                if self.state != Disconnected {
                    self.generation += 1;
                    self.clear_cycle();
                    self.state = Disconnected;
                    effects.push(Effect::CancelPending);
                    effects.push(Effect::CloseTransport);
                }
            }

            Input::Pause => {
                if self.state != Paused {
                    self.generation += 1;
                    self.exhausted = false;
                    self.state = Paused;
                    effects.push(Effect::CancelPending);
                    effects.push(Effect::CloseTransport);
                }
            }

            // An attempt already in flight keeps its cycle and refresh budget
            Input::Reset => {
                if matches!(self.state, Paused | Reconnecting) {
                    self.clear_cycle();
                    effects.push(Effect::CancelPending);
                    self.begin_attempt(&mut effects);
                }
            }

            Input::ForceReconnect => {
                self.generation += 1;
                self.clear_cycle();
                effects.push(Effect::CancelPending);
                effects.push(Effect::CloseTransport);
                self.begin_attempt(&mut effects);
            }

            Input::HandshakeSucceeded { generation } => {
                if self.is_current(generation, Connecting) {
                    self.state = Connected;
                    self.attempt = 0;
                    self.refreshed_this_cycle = false;
                    self.last_error = None;
                    effects.push(Effect::ActivateTransport);
                    effects.push(Effect::ReplaySubscriptions);
                }
            }

            Input::HandshakeFailed {
                generation,
                failure,
            } => {
                if self.is_current(generation, Connecting) {
                    self.last_error = Some(failure.to_string());
                    if failure.is_auth() && !self.refreshed_this_cycle {
                        self.refreshed_this_cycle = true;
                        effects.push(Effect::RefreshCredentials { generation });
                    } else {
                        self.fail(&mut effects);
                    }
                }
            }

            Input::RefreshSucceeded { generation } => {
                if self.is_current(generation, Connecting) {
                    self.begin_attempt(&mut effects);
                }
            }

            Input::RefreshFailed { generation, reason } => {
                if self.is_current(generation, Connecting) {
                    self.last_error = Some(reason);
                    self.fail(&mut effects);
                }
            }

            Input::TransportClosed { generation, reason } => {
                if self.is_current(generation, Connected) {
                    self.last_error = Some(reason);
                    effects.push(Effect::CloseTransport);
                    self.fail(&mut effects);
                }
            }

            Input::RetryElapsed { generation } => {
                if self.is_current(generation, Reconnecting) {
                    self.begin_attempt(&mut effects);
                }
            }
        }
        effects
    }

    fn is_current(&self, generation: u64, expected: ConnectionState) -> bool {
        let current = generation == self.generation && self.state == expected;
        if !current {
            tracing::debug!(
                "Ignoring stale completion (generation {}, current {} in {})",
                generation,
                self.generation,
                self.state
            );
        }
        current
    }

    fn clear_cycle(&mut self) {
        self.attempt = 0;
        self.refreshed_this_cycle = false;
        self.exhausted = false;
    }

    fn begin_attempt(&mut self, effects: &mut Vec<Effect>) {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        effects.push(Effect::OpenTransport {
            generation: self.generation,
        });
    }

    /// A connect failed or a live link dropped
    fn fail(&mut self, effects: &mut Vec<Effect>) {
        self.attempt += 1;
        if self.policy.is_exhausted(self.attempt) {
            self.generation += 1;
            self.state = ConnectionState::Paused;
            self.exhausted = true;
            effects.push(Effect::CancelPending);
            effects.push(Effect::Exhausted {
                attempts: self.attempt,
                last_error: self.last_error.clone(),
            });
        } else {
            self.state = ConnectionState::Reconnecting;
            effects.push(Effect::ScheduleRetry {
                generation: self.generation,
                delay: self.policy.delay_for(self.attempt),
            });
        }
    }
}
