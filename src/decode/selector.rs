//! Decode path selection
//!
//! Maps a session's requested [`DecodeMode`] onto one of the two structurally
//! different data paths, and configures the hardware engine with fallback
//! ordering when that path is chosen.

use anyhow::{Context, Result, bail};
use log::{debug, warn};

use super::gate::ResourceInitGate;
use crate::config::{AutoPathPolicy, DecodeMode};
use crate::sdk::{DecodeEngine, EngineConfig, EnginePort, EngineVariant, SurfaceHandle};

/// The two data paths, as a closed variant. They share nothing beyond the
/// play/stop contract, so there is no trait hierarchy here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Vendor-direct rendering; overlay-capable; no frame callback.
    Software,
    /// GPU engine decode; frame callback required; no overlay support.
    Hardware,
}

/// Resolve a decode mode to a path at session construction time.
///
/// `Auto` follows the runtime policy; the default resolves to software,
/// matching the behavior operators already rely on.
pub fn resolved_kind(mode: DecodeMode, auto_path: AutoPathPolicy) -> PathKind {
    match mode {
        DecodeMode::Software => PathKind::Software,
        DecodeMode::Hardware => PathKind::Hardware,
        DecodeMode::Auto => match auto_path {
            AutoPathPolicy::PreferSoftware => PathKind::Software,
            AutoPathPolicy::PreferHardware => PathKind::Hardware,
        },
    }
}

/// Configure the hardware engine for one session: initialize the subsystem
/// through the gate, draw a port from the pool, then try each engine variant
/// in priority order until one configures and opens.
///
/// An explicit hardware request never falls back to software; if every
/// variant fails the port is returned to the pool and the error propagates.
pub fn configure_hardware(
    engine: &dyn DecodeEngine,
    gate: &ResourceInitGate,
    surface: SurfaceHandle,
    buffer_bytes: usize,
) -> Result<EnginePort> {
    if !gate.ensure_initialized(engine) {
        bail!("hardware decode subsystem unavailable");
    }

    let port = engine
        .allocate_port()
        .context("engine port allocation failed")?;

    const VARIANTS: [EngineVariant; 2] = [EngineVariant::FastPath, EngineVariant::Compat];
    for variant in VARIANTS {
        let config = EngineConfig {
            variant,
            buffer_bytes,
            surface,
        };
        match engine.configure(port, &config).and_then(|()| engine.open(port)) {
            Ok(()) => {
                debug!("{port} configured with {variant} engine, {buffer_bytes} byte buffer");
                return Ok(port);
            }
            Err(e) => {
                warn!("{variant} engine rejected {port}: {e:#}");
            }
        }
    }

    // Port must not leak when every variant fails.
    if let Err(e) = engine.release_port(port) {
        warn!("releasing {port} after configuration failure: {e:#}");
    }
    bail!("no hardware engine variant accepted the configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::SimulatedSdk;

    #[test]
    fn mode_resolution() {
        assert_eq!(
            resolved_kind(DecodeMode::Software, AutoPathPolicy::PreferSoftware),
            PathKind::Software
        );
        assert_eq!(
            resolved_kind(DecodeMode::Hardware, AutoPathPolicy::PreferSoftware),
            PathKind::Hardware
        );
        assert_eq!(
            resolved_kind(DecodeMode::Auto, AutoPathPolicy::PreferSoftware),
            PathKind::Software
        );
        assert_eq!(
            resolved_kind(DecodeMode::Auto, AutoPathPolicy::PreferHardware),
            PathKind::Hardware
        );
    }

    #[test]
    fn fast_path_failure_falls_back_to_compat() {
        let sdk = SimulatedSdk::new();
        let gate = ResourceInitGate::new();
        sdk.fail_variant(EngineVariant::FastPath);

        let port =
            configure_hardware(sdk.as_ref(), &gate, SurfaceHandle::new(1), 1024).unwrap();
        assert!(port.is_valid());
        assert_eq!(sdk.ports_in_use(), 1);
    }

    #[test]
    fn double_failure_releases_port() {
        let sdk = SimulatedSdk::new();
        let gate = ResourceInitGate::new();
        sdk.fail_variant(EngineVariant::FastPath);
        sdk.fail_variant(EngineVariant::Compat);

        assert!(configure_hardware(sdk.as_ref(), &gate, SurfaceHandle::new(1), 1024).is_err());
        assert_eq!(sdk.ports_in_use(), 0);
    }

    #[test]
    fn subsystem_failure_blocks_hardware() {
        let sdk = SimulatedSdk::new();
        sdk.fail_subsystem_init();
        let gate = ResourceInitGate::new();

        assert!(configure_hardware(sdk.as_ref(), &gate, SurfaceHandle::new(1), 1024).is_err());
        assert_eq!(sdk.ports_in_use(), 0);
    }
}
