//! One-shot deadline timers on the session timeline
//!
//! Deadlines are absolute milliseconds on the session's own clock, which only
//! advances while a run is live. A paused session therefore freezes every
//! armed timer without touching it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    deadline: Option<f64>,
}

impl Timer {
    /// Arm (or re-arm) to fire `duration_ms` after `now`
    pub fn arm(&mut self, now: f64, duration_ms: f64) {
        self.deadline = Some(now + duration_ms.max(0.0));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.deadline.map(|d| (d - now).max(0.0))
    }

    /// Disarm and report true if the deadline has been reached
    pub fn fire_if_due(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
