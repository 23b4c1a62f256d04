//! Engine configuration: decode modes, stream quality tiers, nominal stream
//! profiles and tunable runtime options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decode path requested for a session, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Vendor-direct rendering on the CPU. The only overlay-capable path.
    Software,
    /// GPU-accelerated decode through the hardware engine. No silent
    /// fallback to software when the engine cannot be configured.
    Hardware,
    /// Path chosen by [`AutoPathPolicy`] at session construction.
    Auto,
}

/// Resolution/bitrate tier requested from the camera, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamQuality {
    /// High-resolution main stream.
    Primary,
    /// Low-resolution/low-bitrate sub stream.
    Secondary,
}

impl StreamQuality {
    pub fn is_secondary(&self) -> bool {
        matches!(self, StreamQuality::Secondary)
    }
}

/// Nominal stream characteristics used as statistics placeholders until the
/// first real measurements arrive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
}

impl StreamProfile {
    /// Nominal profile for a quality tier.
    pub fn nominal(quality: StreamQuality) -> Self {
        match quality {
            StreamQuality::Primary => StreamProfile {
                width: 1920,
                height: 1080,
                fps: 25,
                bitrate_kbps: 4000,
            },
            StreamQuality::Secondary => StreamProfile {
                width: 704,
                height: 576,
                fps: 15,
                bitrate_kbps: 512,
            },
        }
    }
}

/// What `DecodeMode::Auto` resolves to at session construction.
///
/// The deployed systems this engine replaces resolved Auto to the software
/// path; changing that changes externally visible decode quality, so
/// `PreferSoftware` stays the default and `PreferHardware` is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoPathPolicy {
    #[default]
    PreferSoftware,
    PreferHardware,
}

/// Tunables shared by every session created from one runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuntimeOptions {
    pub auto_path: AutoPathPolicy,
    /// Log every Nth consecutive ingestion error.
    pub error_log_every: u64,
    /// Refresh engine measurements every Nth frame callback.
    pub stats_sample_every: u64,
    /// Settling wait before reallocating on an idempotent restart.
    pub restart_settle_ms: u64,
    /// Settling wait between stream stop and engine release.
    pub stop_settle_ms: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            auto_path: AutoPathPolicy::default(),
            error_log_every: 50,
            stats_sample_every: 32,
            restart_settle_ms: 200,
            stop_settle_ms: 120,
        }
    }
}

impl RuntimeOptions {
    /// Options with zero settling waits, for tests and simulators where no
    /// native calls are in flight.
    pub fn without_settling() -> Self {
        Self {
            restart_settle_ms: 0,
            stop_settle_ms: 0,
            ..Self::default()
        }
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_profiles() {
        let primary = StreamProfile::nominal(StreamQuality::Primary);
        assert_eq!((primary.width, primary.height), (1920, 1080));
        assert_eq!(primary.fps, 25);
        assert_eq!(primary.bitrate_kbps, 4000);

        let secondary = StreamProfile::nominal(StreamQuality::Secondary);
        assert_eq!((secondary.width, secondary.height), (704, 576));
        assert_eq!(secondary.fps, 15);
        assert_eq!(secondary.bitrate_kbps, 512);
    }

    #[test]
    fn auto_defaults_to_software() {
        assert_eq!(AutoPathPolicy::default(), AutoPathPolicy::PreferSoftware);
    }
}
