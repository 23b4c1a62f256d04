//! camwall — per-channel video stream session engine
//!
//! The core of a multi-camera live viewer: each displayed channel is driven
//! by a [`VideoStreamSession`] that opens the camera's stream, picks a decode
//! path (vendor-direct software rendering or GPU-engine hardware decode),
//! ingests frame data safely across the path boundary, recovers from buffer
//! overruns and tracks per-stream statistics.
//!
//! Device connections, the split-screen layout and all UI chrome live in
//! collaborating components; they hand this engine a connected-device handle
//! and a display surface and read back status and statistics.

pub mod config;
pub mod decode;
pub mod sdk;
pub mod session;

pub use config::{AutoPathPolicy, DecodeMode, RuntimeOptions, StreamProfile, StreamQuality};
pub use decode::{PathKind, ResourceInitGate, ingest_buffer_size};
pub use session::VideoStreamSession;
pub use session::monitor::{SessionMonitor, StreamAlert};
pub use session::runtime::VideoRuntime;
pub use session::stats::{StatsSnapshot, StreamStats};
