//! Decode path machinery: subsystem init gate, buffer sizing policy and
//! path selection with engine fallback.

pub mod gate;
pub mod policy;
pub mod selector;

pub use gate::ResourceInitGate;
pub use policy::ingest_buffer_size;
pub use selector::{PathKind, configure_hardware, resolved_kind};
