//! Core types shared with the vendor SDK boundary

use crate::config::StreamQuality;

/// Handle to a device with an established, logged-in connection.
///
/// Produced by the connection manager; this engine never opens or closes
/// device connections itself. Zero is the null sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub const NULL: DeviceHandle = DeviceHandle(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle to a display surface owned by the window/layout manager.
///
/// Borrowed for the duration of playback, never released by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub const NULL: SurfaceHandle = SurfaceHandle(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle to an open live stream, valid between open and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One allocated instance of the hardware decode engine, drawn from the
/// vendor's finite port pool. `INVALID` marks the unused sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnginePort(i32);

impl EnginePort {
    pub const INVALID: EnginePort = EnginePort(-1);

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for EnginePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "port#{}", self.0)
        } else {
            write!(f, "port#invalid")
        }
    }
}

/// Where the vendor SDK should deliver decoded output for an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSink {
    /// Vendor-direct rendering into a display surface (software path).
    Direct(SurfaceHandle),
    /// No direct rendering; frame data is delivered to a registered
    /// [`FrameSink`](super::api::FrameSink) for GPU-side decode (hardware path).
    Offscreen,
}

/// Parameters for opening a live stream on a connected device.
#[derive(Debug, Clone, Copy)]
pub struct StreamOpenRequest {
    pub channel: u32,
    pub quality: StreamQuality,
    pub sink: RenderSink,
}

/// Hardware decode engine flavors, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineVariant {
    /// GPU fast path; preferred when the driver supports it.
    FastPath,
    /// Secondary GPU variant with broader driver compatibility.
    Compat,
}

impl std::fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineVariant::FastPath => write!(f, "fast-path"),
            EngineVariant::Compat => write!(f, "compat"),
        }
    }
}

/// Configuration applied to an allocated engine port before opening it.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub variant: EngineVariant,
    /// Source buffer size in bytes, see [`crate::decode::policy`].
    pub buffer_bytes: usize,
    /// Surface the engine renders decoded frames into.
    pub surface: SurfaceHandle,
}

/// Result of feeding one frame buffer into the decode engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Buffer accepted for decode.
    Accepted,
    /// Engine source buffer is full; caller must reset it and carry on.
    BufferFull,
    /// Any other engine error, with the vendor error code.
    Error(i32),
}

/// Decoded-stream measurements queried from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles() {
        assert!(DeviceHandle::NULL.is_null());
        assert!(!DeviceHandle::new(7).is_null());
        assert!(SurfaceHandle::NULL.is_null());
        assert!(!SurfaceHandle::new(1).is_null());
    }

    #[test]
    fn engine_port_sentinel() {
        assert!(!EnginePort::INVALID.is_valid());
        assert!(EnginePort::new(0).is_valid());
        assert_eq!(EnginePort::new(3).to_string(), "port#3");
        assert_eq!(EnginePort::INVALID.to_string(), "port#invalid");
    }
}
