//! Shared command-synthesis settings.
//!
//! A single `{length, scope}` record shared between the workers (readers)
//! and the tuner (writer). Every access goes through the interior lock, and
//! every mutation clamps back into the configured limits.

use std::sync::Mutex;

/// Hard bounds for the synthesis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisLimits {
    /// Minimum argument count of a synthesized command.
    pub cmd_min: usize,
    /// Maximum argument count of a synthesized command.
    pub cmd_max: usize,
    /// Minimum vocabulary sampling scope, percent.
    pub scope_min: u32,
    /// Maximum vocabulary sampling scope, percent.
    pub scope_max: u32,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self {
            cmd_min: 1,
            cmd_max: 10,
            scope_min: 1,
            scope_max: 100,
        }
    }
}

/// Consistent point-in-time view of the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisSnapshot {
    pub length: usize,
    pub scope: u32,
}

#[derive(Debug)]
struct SettingsState {
    length: usize,
    scope: u32,
}

/// Lock-guarded synthesis settings record.
#[derive(Debug)]
pub struct SynthesisSettings {
    limits: SynthesisLimits,
    state: Mutex<SettingsState>,
}

impl SynthesisSettings {
    /// Create settings clamped into `limits`.
    pub fn new(limits: SynthesisLimits, length: usize, scope: u32) -> Self {
        Self {
            limits,
            state: Mutex::new(SettingsState {
                length: length.clamp(limits.cmd_min, limits.cmd_max),
                scope: scope.clamp(limits.scope_min, limits.scope_max),
            }),
        }
    }

    pub fn limits(&self) -> SynthesisLimits {
        self.limits
    }

    /// Read both parameters under the lock.
    pub fn snapshot(&self) -> SynthesisSnapshot {
        let state = self.state.lock().unwrap();
        SynthesisSnapshot {
            length: state.length,
            scope: state.scope,
        }
    }

    /// Shift the command length by `delta`, clamped into the limits.
    ///
    /// Returns the new length.
    pub fn adjust_length(&self, delta: i64) -> usize {
        let mut state = self.state.lock().unwrap();
        let shifted = state.length as i64 + delta;
        let clamped = shifted.clamp(self.limits.cmd_min as i64, self.limits.cmd_max as i64);
        state.length = clamped as usize;
        state.length
    }
}
