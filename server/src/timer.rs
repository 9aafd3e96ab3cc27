//! Per-room countdown
//!
//! Each room owns exactly one [`PhaseTimer`]. Every phase transition goes
//! through [`PhaseTimer::arm`] or [`PhaseTimer::cancel`], which replace the
//! previous state wholesale, so a countdown from an earlier phase can never
//! fire against newer state. The timer does not schedule anything itself: the
//! server loop calls [`PhaseTimer::poll`] at a fixed interval and the room
//! reacts to the returned [`TimerEvent`].

use std::time::{Duration, Instant};

/// Round phase a countdown belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the current submitter to send a fact.
    Submission,
    /// Waiting for the other players to vote.
    Voting,
    /// Pause after a reveal before the next submitter is chosen.
    Reveal,
}

impl Phase {
    /// Phases whose remaining seconds are broadcast to the room.
    pub fn announces_ticks(self) -> bool {
        !matches!(self, Phase::Reveal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerState {
    Idle,
    Counting {
        phase: Phase,
        deadline: Instant,
        last_announced: u32,
    },
    Expired(Phase),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick(u32),
    Expired(Phase),
}

#[derive(Debug, Clone)]
pub struct PhaseTimer {
    state: TimerState,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Starts a countdown for `phase`, discarding whatever was running.
    ///
    /// Returns the whole seconds remaining, which is what the caller should
    /// announce immediately.
    pub fn arm(&mut self, phase: Phase, duration: Duration, now: Instant) -> u32 {
        let seconds = ceil_secs(duration);
        self.state = TimerState::Counting {
            phase,
            deadline: now + duration,
            last_announced: seconds,
        };
        seconds
    }

    pub fn cancel(&mut self) {
        self.state = TimerState::Idle;
    }

    pub fn is_counting(&self) -> bool {
        matches!(self.state, TimerState::Counting { .. })
    }

    pub fn phase(&self) -> Option<Phase> {
        match self.state {
            TimerState::Counting { phase, .. } => Some(phase),
            _ => None,
        }
    }

    pub fn remaining_secs(&self, now: Instant) -> u32 {
        match self.state {
            TimerState::Counting { deadline, .. } => {
                ceil_secs(deadline.saturating_duration_since(now))
            }
            _ => 0,
        }
    }

    /// Advances the countdown to `now`.
    ///
    /// Yields `Expired` exactly once per arm. `Tick` is only yielded for
    /// announcing phases and only when the whole-second value has dropped
    /// since the last announcement.
    pub fn poll(&mut self, now: Instant) -> Option<TimerEvent> {
        let TimerState::Counting {
            phase,
            deadline,
            last_announced,
        } = self.state
        else {
            return None;
        };

        if now >= deadline {
            self.state = TimerState::Expired(phase);
            return Some(TimerEvent::Expired(phase));
        }

        let remaining = ceil_secs(deadline - now);
        if remaining < last_announced {
            self.state = TimerState::Counting {
                phase,
                deadline,
                last_announced: remaining,
            };
            if phase.announces_ticks() {
                return Some(TimerEvent::Tick(remaining));
            }
        }

        None
    }
}

fn ceil_secs(duration: Duration) -> u32 {
    let secs = duration.as_secs();
    let whole = if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    };
    whole.min(u32::MAX as u64) as u32
}
