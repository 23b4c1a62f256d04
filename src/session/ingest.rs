//! Hardware-path frame ingestion
//!
//! The vendor SDK delivers frame buffers from its own thread(s); this sink
//! forwards them to the decode engine and absorbs the two failure shapes that
//! occur in steady state: engine buffer overruns (reset and carry on) and
//! transient decode errors (count, surface every Nth, never stop playback).

use log::{debug, error, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::stats::StreamStats;
use crate::config::RuntimeOptions;
use crate::sdk::{DecodeEngine, EnginePort, FeedOutcome, FrameSink};

/// Frame sink wired between the SDK's delivery thread and the decode engine.
/// One per hardware-path playback; dropped when the session stops.
pub struct FrameIngestPipeline {
    engine: Arc<dyn DecodeEngine>,
    port: EnginePort,
    stats: Arc<StreamStats>,
    /// Cleared by the control context on stop, before handles are released.
    /// Deliveries observed after that are discarded here.
    hardware_active: Arc<AtomicBool>,
    callbacks: AtomicU64,
    error_log_every: u64,
    stats_sample_every: u64,
}

impl FrameIngestPipeline {
    pub fn new(
        engine: Arc<dyn DecodeEngine>,
        port: EnginePort,
        stats: Arc<StreamStats>,
        hardware_active: Arc<AtomicBool>,
        options: &RuntimeOptions,
    ) -> Self {
        Self {
            engine,
            port,
            stats,
            hardware_active,
            callbacks: AtomicU64::new(0),
            error_log_every: options.error_log_every.max(1),
            stats_sample_every: options.stats_sample_every.max(1),
        }
    }

    fn refresh_stats(&self) {
        if let Some(measured) = self.engine.query_stats(self.port) {
            self.stats.set_measured(
                measured.width,
                measured.height,
                measured.fps,
                measured.bitrate_kbps,
            );
        }
        self.stats.refresh_rates();
    }
}

impl FrameSink for FrameIngestPipeline {
    fn deliver(&self, data: Option<&[u8]>) {
        // A delivery while the hardware path is not active means the stream
        // is misconfigured (a direct-rendered stream must never have a sink)
        // or the session is mid-stop. Either way: drop, never double-process.
        if !self.hardware_active.load(Ordering::Acquire) {
            let n = self.stats.record_misroute();
            if n == 1 || n % 100 == 0 {
                error!(
                    "frame callback on {} while hardware path inactive ({n} total); dropping",
                    self.port
                );
            }
            return;
        }

        let Some(payload) = data else {
            self.stats.record_drop();
            debug!("null frame buffer on {}", self.port);
            return;
        };
        if payload.is_empty() {
            self.stats.record_drop();
            return;
        }

        match self.engine.feed(self.port, payload) {
            FeedOutcome::Accepted => {
                self.stats.record_frame(payload.len());
                self.stats.clear_errors();

                let n = self.callbacks.fetch_add(1, Ordering::Relaxed) + 1;
                if n % self.stats_sample_every == 0 {
                    self.refresh_stats();
                }
            }
            FeedOutcome::BufferFull => {
                // Expected under sustained overrun: discard the engine's
                // source buffer and keep ingesting.
                if let Err(e) = self.engine.reset_buffer(self.port) {
                    warn!("source buffer reset failed on {}: {e:#}", self.port);
                }
                self.stats.record_overrun();
            }
            FeedOutcome::Error(code) => {
                let streak = self.stats.record_error();
                if streak % self.error_log_every == 1 {
                    warn!(
                        "engine feed error {code} on {} ({streak} consecutive)",
                        self.port
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StreamProfile, StreamQuality};
    use crate::sdk::{EngineStats, SimulatedSdk};

    fn pipeline(sdk: &Arc<SimulatedSdk>, active: bool) -> (FrameIngestPipeline, Arc<StreamStats>) {
        let port = sdk.allocate_port().unwrap();
        let stats = Arc::new(StreamStats::new(StreamProfile::nominal(
            StreamQuality::Primary,
        )));
        let pipeline = FrameIngestPipeline::new(
            sdk.clone() as Arc<dyn DecodeEngine>,
            port,
            stats.clone(),
            Arc::new(AtomicBool::new(active)),
            &RuntimeOptions::default(),
        );
        (pipeline, stats)
    }

    #[test]
    fn inactive_path_drops_everything() {
        let sdk = SimulatedSdk::new();
        let (pipeline, stats) = pipeline(&sdk, false);

        pipeline.deliver(Some(b"frame"));
        pipeline.deliver(None);

        assert_eq!(stats.frames(), 0);
        assert_eq!(stats.bytes(), 0);
        assert_eq!(stats.dropped_frames(), 0);
        assert_eq!(stats.misrouted_callbacks(), 2);
        assert_eq!(sdk.fed_frames(), 0);
    }

    #[test]
    fn null_and_empty_buffers_count_as_drops() {
        let sdk = SimulatedSdk::new();
        let (pipeline, stats) = pipeline(&sdk, true);

        pipeline.deliver(None);
        pipeline.deliver(Some(&[]));

        assert_eq!(stats.dropped_frames(), 2);
        assert_eq!(stats.overrun_recoveries(), 0);
        assert_eq!(sdk.fed_frames(), 0);
    }

    #[test]
    fn overrun_resets_buffer_without_dropping() {
        let sdk = SimulatedSdk::new();
        let (pipeline, stats) = pipeline(&sdk, true);
        sdk.script_feed([FeedOutcome::BufferFull; 3]);

        for _ in 0..3 {
            pipeline.deliver(Some(b"frame"));
        }

        assert_eq!(stats.overrun_recoveries(), 3);
        assert_eq!(stats.dropped_frames(), 0);
        assert_eq!(sdk.buffer_resets(), 3);
    }

    #[test]
    fn error_streak_ends_on_accepted_feed() {
        let sdk = SimulatedSdk::new();
        let (pipeline, stats) = pipeline(&sdk, true);
        sdk.script_feed([FeedOutcome::Error(9), FeedOutcome::Error(9)]);

        pipeline.deliver(Some(b"frame"));
        pipeline.deliver(Some(b"frame"));
        assert_eq!(stats.consecutive_errors(), 2);

        pipeline.deliver(Some(b"frame"));
        assert_eq!(stats.consecutive_errors(), 0);
        assert_eq!(stats.frames(), 1);
    }

    #[test]
    fn sampled_stats_refresh() {
        let sdk = SimulatedSdk::new();
        sdk.set_engine_stats(EngineStats {
            width: 2560,
            height: 1440,
            fps: 30,
            bitrate_kbps: 6000,
        });
        let port = sdk.allocate_port().unwrap();
        let stats = Arc::new(StreamStats::new(StreamProfile::nominal(
            StreamQuality::Primary,
        )));
        let options = RuntimeOptions {
            stats_sample_every: 4,
            ..RuntimeOptions::default()
        };
        let pipeline = FrameIngestPipeline::new(
            sdk.clone() as Arc<dyn DecodeEngine>,
            port,
            stats.clone(),
            Arc::new(AtomicBool::new(true)),
            &options,
        );

        for _ in 0..3 {
            pipeline.deliver(Some(b"frame"));
        }
        // not sampled yet, still nominal
        assert_eq!(stats.snapshot().width, 1920);

        pipeline.deliver(Some(b"frame"));
        let snap = stats.snapshot();
        assert_eq!((snap.width, snap.height), (2560, 1440));
    }
}
