//! In-process simulated vendor SDK
//!
//! Stands in for the real vendor bindings in the demo binary and the test
//! suite: same trait surface, no cameras or GPU required. Failure points are
//! scriptable so path-selection fallback, overrun recovery and rollback
//! behavior can be exercised deterministically.

use anyhow::{Result, anyhow};
use bytes::Bytes;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use super::api::{DecodeEngine, FrameSink, StreamControl};
use super::types::{
    DeviceHandle, EngineConfig, EnginePort, EngineStats, FeedOutcome, StreamHandle,
    StreamOpenRequest, SurfaceHandle,
};

/// Vendor-style error codes surfaced through `last_error_code`.
pub const SIM_ERR_INVALID_HANDLE: i32 = 3;
pub const SIM_ERR_NO_PORT: i32 = 12;
pub const SIM_ERR_UNSUPPORTED: i32 = 21;
pub const SIM_ERR_CALLBACK: i32 = 27;

/// Engine ports available before `allocate_port` starts failing.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

struct SimStream {
    request: StreamOpenRequest,
    sink: Option<Arc<dyn FrameSink>>,
    overlay: bool,
}

#[derive(Default)]
struct SimState {
    next_stream: u64,
    next_port: i32,
    pool_capacity: usize,
    ports_in_use: HashSet<i32>,
    streams: HashMap<u64, SimStream>,
    failing_variants: HashSet<super::types::EngineVariant>,
    feed_script: VecDeque<FeedOutcome>,
    subsystem_up: bool,
    fail_subsystem_init: bool,
    fail_sink_registration: bool,
    fail_open_stream: bool,
    engine_stats: Option<EngineStats>,
    overlay_calls: Vec<(StreamHandle, bool)>,
    fed_frames: u64,
    buffer_resets: u64,
}

/// Simulated device + decode engine behind the two vendor traits.
pub struct SimulatedSdk {
    inner: Mutex<SimState>,
    last_error: AtomicI32,
}

impl SimulatedSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SimState {
                next_stream: 1,
                next_port: 0,
                pool_capacity: DEFAULT_POOL_CAPACITY,
                ..SimState::default()
            }),
            last_error: AtomicI32::new(0),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().unwrap()
    }

    fn fail(&self, code: i32, msg: &str) -> anyhow::Error {
        self.last_error.store(code, Ordering::Relaxed);
        anyhow!("{msg} (code {code})")
    }

    // ── Failure injection ───────────────────────────────────────

    pub fn set_pool_capacity(&self, capacity: usize) {
        self.state().pool_capacity = capacity;
    }

    /// Make `configure` fail for one engine variant.
    pub fn fail_variant(&self, variant: super::types::EngineVariant) {
        self.state().failing_variants.insert(variant);
    }

    pub fn fail_subsystem_init(&self) {
        self.state().fail_subsystem_init = true;
    }

    pub fn fail_sink_registration(&self) {
        self.state().fail_sink_registration = true;
    }

    pub fn fail_open_stream(&self, fail: bool) {
        self.state().fail_open_stream = fail;
    }

    /// Queue feed outcomes; once drained, `feed` accepts everything.
    pub fn script_feed<I: IntoIterator<Item = FeedOutcome>>(&self, outcomes: I) {
        self.state().feed_script.extend(outcomes);
    }

    /// Set the measurements `query_stats` reports.
    pub fn set_engine_stats(&self, stats: EngineStats) {
        self.state().engine_stats = Some(stats);
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn ports_in_use(&self) -> usize {
        self.state().ports_in_use.len()
    }

    pub fn open_stream_count(&self) -> usize {
        self.state().streams.len()
    }

    pub fn registered_sink_count(&self) -> usize {
        self.state().streams.values().filter(|s| s.sink.is_some()).count()
    }

    pub fn subsystem_initialized(&self) -> bool {
        self.state().subsystem_up
    }

    pub fn overlay_requests(&self) -> Vec<(StreamHandle, bool)> {
        self.state().overlay_calls.clone()
    }

    pub fn fed_frames(&self) -> u64 {
        self.state().fed_frames
    }

    pub fn buffer_resets(&self) -> u64 {
        self.state().buffer_resets
    }

    // ── Frame delivery (the SDK's internal delivery thread role) ─

    /// Invoke every registered frame sink once with the given payload,
    /// the way the vendor's delivery thread would. `None` models a null
    /// buffer pointer crossing the native boundary.
    pub fn deliver_frame_to_all(&self, data: Option<&[u8]>) {
        // Clone sinks out so delivery runs without the state lock held;
        // sinks call back into `feed`.
        let sinks: Vec<Arc<dyn FrameSink>> = self
            .state()
            .streams
            .values()
            .filter_map(|s| s.sink.clone())
            .collect();
        for sink in sinks {
            sink.deliver(data);
        }
    }

    /// Synthesize an encoded-frame payload of the given size.
    pub fn synthetic_frame(len: usize) -> Bytes {
        Bytes::from(vec![0x42u8; len])
    }
}

impl StreamControl for SimulatedSdk {
    fn open_stream(
        &self,
        device: DeviceHandle,
        request: &StreamOpenRequest,
    ) -> Result<StreamHandle> {
        if device.is_null() {
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "null device handle"));
        }
        let mut state = self.state();
        if state.fail_open_stream {
            drop(state);
            return Err(self.fail(SIM_ERR_UNSUPPORTED, "stream open rejected"));
        }
        let id = state.next_stream;
        state.next_stream += 1;
        state.streams.insert(
            id,
            SimStream {
                request: *request,
                sink: None,
                overlay: false,
            },
        );
        debug!("sim: opened stream {} on channel {}", id, request.channel);
        Ok(StreamHandle::new(id))
    }

    fn stop_stream(&self, stream: StreamHandle) -> Result<()> {
        if self.state().streams.remove(&stream.raw()).is_none() {
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "unknown stream handle"));
        }
        Ok(())
    }

    fn request_overlay(&self, stream: StreamHandle, enabled: bool) -> Result<()> {
        let mut state = self.state();
        let Some(entry) = state.streams.get_mut(&stream.raw()) else {
            drop(state);
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "unknown stream handle"));
        };
        entry.overlay = enabled;
        state.overlay_calls.push((stream, enabled));
        Ok(())
    }

    fn register_frame_sink(&self, stream: StreamHandle, sink: Arc<dyn FrameSink>) -> Result<()> {
        let mut state = self.state();
        if state.fail_sink_registration {
            drop(state);
            return Err(self.fail(SIM_ERR_CALLBACK, "sink registration rejected"));
        }
        let Some(entry) = state.streams.get_mut(&stream.raw()) else {
            drop(state);
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "unknown stream handle"));
        };
        if matches!(entry.request.sink, super::types::RenderSink::Direct(_)) {
            drop(state);
            return Err(self.fail(SIM_ERR_CALLBACK, "sink on direct-rendered stream"));
        }
        entry.sink = Some(sink);
        Ok(())
    }

    fn clear_surface(&self, _surface: SurfaceHandle) -> Result<()> {
        Ok(())
    }

    fn last_error_code(&self) -> i32 {
        self.last_error.load(Ordering::Relaxed)
    }
}

impl DecodeEngine for SimulatedSdk {
    fn subsystem_init(&self) -> Result<()> {
        let mut state = self.state();
        if state.fail_subsystem_init {
            drop(state);
            return Err(self.fail(SIM_ERR_UNSUPPORTED, "decode subsystem unavailable"));
        }
        state.subsystem_up = true;
        Ok(())
    }

    fn subsystem_release(&self) -> Result<()> {
        self.state().subsystem_up = false;
        Ok(())
    }

    fn allocate_port(&self) -> Result<EnginePort> {
        let mut state = self.state();
        if state.ports_in_use.len() >= state.pool_capacity {
            drop(state);
            return Err(self.fail(SIM_ERR_NO_PORT, "engine port pool exhausted"));
        }
        let raw = state.next_port;
        state.next_port += 1;
        state.ports_in_use.insert(raw);
        Ok(EnginePort::new(raw))
    }

    fn release_port(&self, port: EnginePort) -> Result<()> {
        if !self.state().ports_in_use.remove(&port.raw()) {
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "release of unallocated port"));
        }
        Ok(())
    }

    fn configure(&self, port: EnginePort, config: &EngineConfig) -> Result<()> {
        let state = self.state();
        if !state.ports_in_use.contains(&port.raw()) {
            drop(state);
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "configure on unallocated port"));
        }
        if state.failing_variants.contains(&config.variant) {
            drop(state);
            return Err(self.fail(
                SIM_ERR_UNSUPPORTED,
                "engine variant rejected by simulated driver",
            ));
        }
        Ok(())
    }

    fn open(&self, port: EnginePort) -> Result<()> {
        if !self.state().ports_in_use.contains(&port.raw()) {
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "open on unallocated port"));
        }
        Ok(())
    }

    fn feed(&self, port: EnginePort, data: &[u8]) -> FeedOutcome {
        let mut state = self.state();
        if !state.ports_in_use.contains(&port.raw()) {
            return FeedOutcome::Error(SIM_ERR_INVALID_HANDLE);
        }
        let outcome = state.feed_script.pop_front().unwrap_or(FeedOutcome::Accepted);
        if outcome == FeedOutcome::Accepted {
            state.fed_frames += 1;
            let _ = data.len();
        }
        outcome
    }

    fn reset_buffer(&self, port: EnginePort) -> Result<()> {
        let mut state = self.state();
        if !state.ports_in_use.contains(&port.raw()) {
            drop(state);
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "reset on unallocated port"));
        }
        state.buffer_resets += 1;
        Ok(())
    }

    fn close(&self, port: EnginePort) -> Result<()> {
        if !self.state().ports_in_use.contains(&port.raw()) {
            return Err(self.fail(SIM_ERR_INVALID_HANDLE, "close on unallocated port"));
        }
        Ok(())
    }

    fn query_stats(&self, _port: EnginePort) -> Option<EngineStats> {
        self.state().engine_stats
    }
}
