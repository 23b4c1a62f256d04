//! Vendor SDK seams
//!
//! The engine consumes three opaque vendor surfaces: the live-stream API, the
//! hardware decode engine API, and the frame-delivery callback surface. Each
//! is a trait so sessions run unchanged against the real vendor bindings or
//! the in-process simulator in [`super::sim`].

use anyhow::Result;
use std::sync::Arc;

use super::types::{
    DeviceHandle, EngineConfig, EnginePort, EngineStats, FeedOutcome, StreamHandle,
    StreamOpenRequest, SurfaceHandle,
};

/// Receiver of asynchronously delivered frame buffers.
///
/// Invoked from the SDK's internal delivery thread(s), not from the control
/// thread. Implementations must confine shared mutation to atomics.
pub trait FrameSink: Send + Sync {
    /// One frame buffer from the device. `None` models a null buffer pointer
    /// from the native layer; an empty slice models a zero-length delivery.
    fn deliver(&self, data: Option<&[u8]>);
}

/// Live-stream control surface, keyed by device + channel.
pub trait StreamControl: Send + Sync {
    /// Open a live stream on a connected device.
    fn open_stream(&self, device: DeviceHandle, request: &StreamOpenRequest)
    -> Result<StreamHandle>;

    /// Stop stream reception. Deliveries already queued inside the SDK may
    /// still arrive shortly after this returns.
    fn stop_stream(&self, stream: StreamHandle) -> Result<()>;

    /// Enable or disable the analytics overlay on an open stream.
    /// Only honored by vendor-direct rendering.
    fn request_overlay(&self, stream: StreamHandle, enabled: bool) -> Result<()>;

    /// Register the frame sink for an off-screen stream. Required for the
    /// hardware decode path; must not be called for direct-rendered streams.
    fn register_frame_sink(&self, stream: StreamHandle, sink: Arc<dyn FrameSink>) -> Result<()>;

    /// Blank a display surface after playback ends.
    fn clear_surface(&self, surface: SurfaceHandle) -> Result<()>;

    /// Vendor error code of the most recent failed call, for diagnostics.
    fn last_error_code(&self) -> i32;
}

/// Hardware decode engine surface (port pool + per-port lifecycle).
pub trait DecodeEngine: Send + Sync {
    /// Process-wide subsystem setup. Called once, through the init gate.
    fn subsystem_init(&self) -> Result<()>;

    /// Process-wide subsystem release. Called once at shutdown.
    fn subsystem_release(&self) -> Result<()>;

    /// Allocate one engine instance from the finite pool.
    fn allocate_port(&self) -> Result<EnginePort>;

    /// Return a port to the pool.
    fn release_port(&self, port: EnginePort) -> Result<()>;

    /// Apply an engine configuration to an allocated port.
    fn configure(&self, port: EnginePort, config: &EngineConfig) -> Result<()>;

    /// Start decoding on a configured port.
    fn open(&self, port: EnginePort) -> Result<()>;

    /// Push one frame buffer into the engine's source buffer.
    fn feed(&self, port: EnginePort, data: &[u8]) -> FeedOutcome;

    /// Discard the engine's source buffer contents after an overrun.
    fn reset_buffer(&self, port: EnginePort) -> Result<()>;

    /// Stop decoding on an open port.
    fn close(&self, port: EnginePort) -> Result<()>;

    /// Measurements for the decoded stream, if the engine has any yet.
    fn query_stats(&self, port: EnginePort) -> Option<EngineStats>;
}
