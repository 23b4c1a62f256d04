//! Vendor SDK boundary: opaque handle types, the trait seams the engine
//! consumes, and an in-process simulator for tests and the demo harness.

pub mod api;
pub mod sim;
pub mod types;

pub use api::{DecodeEngine, FrameSink, StreamControl};
pub use sim::SimulatedSdk;
pub use types::{
    DeviceHandle, EngineConfig, EnginePort, EngineStats, EngineVariant, FeedOutcome, RenderSink,
    StreamHandle, StreamOpenRequest, SurfaceHandle,
};
