//! Per-stream statistics
//!
//! All counters mutated from the SDK's frame-delivery context are atomics;
//! the control context only ever reads them or replaces the whole instance
//! on a fresh play.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::StreamProfile;

fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Live statistics for one playing stream.
///
/// Resolution/fps/bitrate start at the nominal profile for the stream's
/// quality tier and are overwritten once real measurements arrive.
pub struct StreamStats {
    width: AtomicU32,
    height: AtomicU32,
    fps: AtomicU32,
    bitrate_kbps: AtomicU32,
    frames: AtomicU64,
    bytes: AtomicU64,
    dropped_frames: AtomicU64,
    overrun_recoveries: AtomicU64,
    consecutive_errors: AtomicU64,
    misrouted_callbacks: AtomicU64,
    last_update_micros: AtomicU64,
    started: Instant,
    started_wall: DateTime<Utc>,
}

impl StreamStats {
    pub fn new(profile: StreamProfile) -> Self {
        Self {
            width: AtomicU32::new(profile.width),
            height: AtomicU32::new(profile.height),
            fps: AtomicU32::new(profile.fps),
            bitrate_kbps: AtomicU32::new(profile.bitrate_kbps),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            overrun_recoveries: AtomicU64::new(0),
            consecutive_errors: AtomicU64::new(0),
            misrouted_callbacks: AtomicU64::new(0),
            last_update_micros: AtomicU64::new(unix_micros()),
            started: Instant::now(),
            started_wall: Utc::now(),
        }
    }

    /// Record one successfully ingested frame.
    pub fn record_frame(&self, size: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
        self.last_update_micros.store(unix_micros(), Ordering::Relaxed);
    }

    /// Record a rejected delivery (null or zero-length buffer).
    pub fn record_drop(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a recovered engine-buffer overrun.
    pub fn record_overrun(&self) {
        self.overrun_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one more consecutive ingestion error; returns the new streak.
    pub fn record_error(&self) -> u64 {
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A successful feed ends the error streak.
    pub fn clear_errors(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// Record a callback that reached a session whose active path takes no
    /// callbacks; returns the new total.
    pub fn record_misroute(&self) -> u64 {
        self.misrouted_callbacks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Overwrite nominal resolution/fps/bitrate with engine measurements.
    pub fn set_measured(&self, width: u32, height: u32, fps: u32, bitrate_kbps: u32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
        if fps > 0 {
            self.fps.store(fps, Ordering::Relaxed);
        }
        if bitrate_kbps > 0 {
            self.bitrate_kbps.store(bitrate_kbps, Ordering::Relaxed);
        }
    }

    /// Derive fps/bitrate from the cumulative counters. Called on the sampled
    /// callback subset so estimates converge even when the engine reports
    /// nothing.
    pub fn refresh_rates(&self) {
        let elapsed = self.started.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let secs = elapsed.as_secs_f64();
        let frames = self.frames.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);
        if frames == 0 {
            return;
        }
        self.fps
            .store((frames as f64 / secs).round() as u32, Ordering::Relaxed);
        self.bitrate_kbps
            .store((bytes as f64 * 8.0 / secs / 1000.0).round() as u32, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn overrun_recoveries(&self) -> u64 {
        self.overrun_recoveries.load(Ordering::Relaxed)
    }

    pub fn consecutive_errors(&self) -> u64 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    pub fn misrouted_callbacks(&self) -> u64 {
        self.misrouted_callbacks.load(Ordering::Relaxed)
    }

    /// Whether no frame arrived within the given window.
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let last = self.last_update_micros.load(Ordering::Relaxed);
        unix_micros().saturating_sub(last) > threshold.as_micros() as u64
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            width: self.width.load(Ordering::Relaxed),
            height: self.height.load(Ordering::Relaxed),
            fps: self.fps.load(Ordering::Relaxed),
            bitrate_kbps: self.bitrate_kbps.load(Ordering::Relaxed),
            frames: self.frames(),
            bytes: self.bytes(),
            dropped_frames: self.dropped_frames(),
            overrun_recoveries: self.overrun_recoveries(),
            consecutive_errors: self.consecutive_errors(),
            started_at: self.started_wall,
            last_update_micros: self.last_update_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a stream's statistics, safe to hand to the UI or
/// serialize for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub frames: u64,
    pub bytes: u64,
    pub dropped_frames: u64,
    pub overrun_recoveries: u64,
    pub consecutive_errors: u64,
    pub started_at: DateTime<Utc>,
    pub last_update_micros: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @{}fps {}kbps, {} frames ({} dropped), {} overruns recovered",
            self.width,
            self.height,
            self.fps,
            self.bitrate_kbps,
            self.frames,
            self.dropped_frames,
            self.overrun_recoveries
        )
    }
}
