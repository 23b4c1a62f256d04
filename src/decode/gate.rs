//! One-time init/teardown gate for the hardware decode subsystem

use log::{error, info, warn};
use std::sync::Mutex;

use crate::sdk::DecodeEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// No init attempt has been made yet.
    Untouched,
    /// Subsystem is up and hardware paths may configure engines.
    Initialized,
    /// Init was attempted and failed; hardware paths must fall back.
    Failed,
    /// Subsystem released at shutdown. No further init attempts.
    TornDown,
}

/// Guards the process-wide hardware decode subsystem so that exactly one
/// caller initializes it and exactly one teardown releases it, however many
/// sessions come and go.
pub struct ResourceInitGate {
    state: Mutex<GateState>,
}

impl ResourceInitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Untouched),
        }
    }

    /// Initialize the subsystem if nobody has yet. Returns whether the
    /// subsystem is usable. Failures are logged, not raised; callers fall
    /// back to the software path.
    pub fn ensure_initialized(&self, engine: &dyn DecodeEngine) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            GateState::Initialized => true,
            GateState::Failed | GateState::TornDown => false,
            GateState::Untouched => match engine.subsystem_init() {
                Ok(()) => {
                    info!("hardware decode subsystem initialized");
                    *state = GateState::Initialized;
                    true
                }
                Err(e) => {
                    error!("hardware decode subsystem init failed: {e:#}");
                    *state = GateState::Failed;
                    false
                }
            },
        }
    }

    /// Whether the subsystem is currently up.
    pub fn is_initialized(&self) -> bool {
        *self.state.lock().unwrap() == GateState::Initialized
    }

    /// Release the subsystem. Only acts when a prior init succeeded;
    /// subsequent calls are no-ops.
    pub fn teardown(&self, engine: &dyn DecodeEngine) {
        let mut state = self.state.lock().unwrap();
        match *state {
            GateState::Initialized => {
                if let Err(e) = engine.subsystem_release() {
                    warn!("hardware decode subsystem release failed: {e:#}");
                }
                *state = GateState::TornDown;
            }
            GateState::Untouched | GateState::Failed => {}
            GateState::TornDown => {
                warn!("duplicate decode subsystem teardown ignored");
            }
        }
    }
}

impl Default for ResourceInitGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::SimulatedSdk;

    #[test]
    fn init_once_teardown_once() {
        let sdk = SimulatedSdk::new();
        let gate = ResourceInitGate::new();

        assert!(!gate.is_initialized());
        assert!(gate.ensure_initialized(sdk.as_ref()));
        assert!(gate.ensure_initialized(sdk.as_ref()));
        assert!(sdk.subsystem_initialized());

        gate.teardown(sdk.as_ref());
        assert!(!sdk.subsystem_initialized());
        assert!(!gate.is_initialized());

        // after teardown, no re-init
        assert!(!gate.ensure_initialized(sdk.as_ref()));
        gate.teardown(sdk.as_ref());
    }

    #[test]
    fn failed_init_stays_failed() {
        let sdk = SimulatedSdk::new();
        sdk.fail_subsystem_init();
        let gate = ResourceInitGate::new();

        assert!(!gate.ensure_initialized(sdk.as_ref()));
        assert!(!gate.ensure_initialized(sdk.as_ref()));
        assert!(!sdk.subsystem_initialized());

        // teardown without successful init is a no-op
        gate.teardown(sdk.as_ref());
    }
}
