//! Process-scoped runtime context
//!
//! One `VideoRuntime` per process, built by the composition root and handed
//! to every session. It owns the pieces all sessions share: the SDK handles,
//! the hardware subsystem init gate, the live-session counter and the tuning
//! options. Teardown happens exactly once, after all sessions are stopped.

use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::RuntimeOptions;
use crate::decode::ResourceInitGate;
use crate::sdk::{DecodeEngine, StreamControl};

pub struct VideoRuntime {
    stream_api: Arc<dyn StreamControl>,
    engine: Arc<dyn DecodeEngine>,
    gate: ResourceInitGate,
    options: RuntimeOptions,
    sessions: AtomicUsize,
    torn_down: AtomicBool,
}

impl VideoRuntime {
    pub fn new(stream_api: Arc<dyn StreamControl>, engine: Arc<dyn DecodeEngine>) -> Arc<Self> {
        Self::with_options(stream_api, engine, RuntimeOptions::default())
    }

    pub fn with_options(
        stream_api: Arc<dyn StreamControl>,
        engine: Arc<dyn DecodeEngine>,
        options: RuntimeOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            stream_api,
            engine,
            gate: ResourceInitGate::new(),
            options,
            sessions: AtomicUsize::new(0),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn stream_api(&self) -> &Arc<dyn StreamControl> {
        &self.stream_api
    }

    pub fn engine(&self) -> &Arc<dyn DecodeEngine> {
        &self.engine
    }

    pub fn gate(&self) -> &ResourceInitGate {
        &self.gate
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Number of live sessions process-wide. Feeds the buffer sizing policy.
    pub fn active_session_count(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }

    pub(crate) fn register_session(&self) -> usize {
        self.sessions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn unregister_session(&self) {
        let prev = self.sessions.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "session counter underflow");
    }

    /// Release the hardware decode subsystem. Call once at process shutdown,
    /// after all sessions are stopped; later calls are no-ops.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let live = self.active_session_count();
        if live > 0 {
            warn!("runtime teardown with {live} session(s) still registered");
        }
        self.gate.teardown(self.engine.as_ref());
        info!("video runtime torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::SimulatedSdk;

    fn runtime() -> (Arc<SimulatedSdk>, Arc<VideoRuntime>) {
        let sdk = SimulatedSdk::new();
        let runtime = VideoRuntime::new(
            sdk.clone() as Arc<dyn StreamControl>,
            sdk.clone() as Arc<dyn DecodeEngine>,
        );
        (sdk, runtime)
    }

    #[test]
    fn session_counter_round_trip() {
        let (_sdk, runtime) = runtime();
        assert_eq!(runtime.active_session_count(), 0);
        assert_eq!(runtime.register_session(), 1);
        assert_eq!(runtime.register_session(), 2);
        runtime.unregister_session();
        assert_eq!(runtime.active_session_count(), 1);
    }

    #[test]
    fn teardown_is_single_shot() {
        let (sdk, runtime) = runtime();
        assert!(runtime.gate().ensure_initialized(sdk.as_ref() as &dyn DecodeEngine));
        assert!(sdk.subsystem_initialized());

        runtime.teardown();
        assert!(!sdk.subsystem_initialized());
        runtime.teardown(); // no-op
    }
}
