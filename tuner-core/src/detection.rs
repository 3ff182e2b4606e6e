//! # Auto-Detection State Machine
//!
//! Decides frame by frame whether the tuner follows whatever string is being
//! played (`Auto`) or stays on a string that has been pinned (`Manual`).
//! In `Auto`, a string is committed only after it has been detected for a
//! run of consecutive frames, so a single stray frame cannot flip the
//! display. Leaving `Manual` is always an explicit user action.

use crate::tuning::GuitarString;
use serde::{Deserialize, Serialize};

/// Whether the tuner picks the string itself or keeps a pinned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    Auto,
    Manual(GuitarString),
}

/// Session-owned detection state, passed into every processing cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionState {
    mode: DetectionMode,
    /// String detected in the previous frame, if any.
    candidate: Option<GuitarString>,
    /// Consecutive frames in which `candidate` was detected.
    run_length: u32,
    /// Frames needed to commit a candidate.
    commit_threshold: u32,
}

impl DetectionState {
    /// Starts in `Auto` with an empty run.
    pub fn new(commit_threshold: u32) -> Self {
        Self {
            mode: DetectionMode::Auto,
            candidate: None,
            run_length: 0,
            commit_threshold,
        }
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// The pinned string, if in `Manual`.
    pub fn pinned(&self) -> Option<GuitarString> {
        match self.mode {
            DetectionMode::Manual(string) => Some(string),
            DetectionMode::Auto => None,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.mode == DetectionMode::Auto
    }

    pub fn run_length(&self) -> u32 {
        self.run_length
    }

    pub fn candidate(&self) -> Option<GuitarString> {
        self.candidate
    }

    /// Feeds one frame's detection result.
    ///
    /// In `Manual` this does nothing. In `Auto` the run grows while the same
    /// string keeps being detected, restarts at 1 for a different string,
    /// and drops to 0 when nothing was detected. Reaching the threshold pins
    /// the string and clears the run.
    ///
    /// # Returns
    /// * `Some(string)` - On the frame that commits `string`
    /// * `None` - Otherwise
    pub fn observe(&mut self, detected: Option<GuitarString>) -> Option<GuitarString> {
        if !self.is_auto() {
            return None;
        }

        match detected {
            None => {
                self.candidate = None;
                self.run_length = 0;
            }
            Some(string) if self.candidate == Some(string) => {
                self.run_length = self.run_length.saturating_add(1);
            }
            Some(string) => {
                self.candidate = Some(string);
                self.run_length = 1;
            }
        }

        match self.candidate {
            Some(string) if self.run_length >= self.commit_threshold => {
                log::info!(
                    "Auto-detected {string} for {} consecutive frames, switching to manual",
                    self.run_length
                );
                self.pin(string);
                Some(string)
            }
            _ => None,
        }
    }

    /// User action: pin `string` and stop auto-detection.
    pub fn pin(&mut self, string: GuitarString) {
        self.mode = DetectionMode::Manual(string);
        self.candidate = None;
        self.run_length = 0;
    }

    /// User action: return to `Auto` with a fresh run.
    pub fn release(&mut self) {
        self.mode = DetectionMode::Auto;
        self.candidate = None;
        self.run_length = 0;
    }
}
