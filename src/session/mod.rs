//! Per-channel video stream session
//!
//! One `VideoStreamSession` per displayed channel. The session owns path
//! selection, the native stream/engine handles and the statistics for its
//! channel, and drives the play/stop lifecycle.
//!
//! Control operations take `&mut self`: the caller's single control thread
//! serializes play/stop/overlay by construction. The only state shared with
//! the SDK's delivery context is atomic (see [`stats`] and the
//! `hardware_active` guard).

pub mod ingest;
pub mod monitor;
pub mod runtime;
pub mod stats;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{DecodeMode, StreamProfile, StreamQuality};
use crate::decode::{self, PathKind};
use crate::sdk::{
    DeviceHandle, EnginePort, RenderSink, StreamHandle, StreamOpenRequest, SurfaceHandle,
};
use ingest::FrameIngestPipeline;
use runtime::VideoRuntime;
use stats::{StatsSnapshot, StreamStats};

pub struct VideoStreamSession {
    runtime: Arc<VideoRuntime>,
    decode_mode: DecodeMode,
    quality: StreamQuality,
    /// Resolved once at construction; Auto never re-resolves mid-life.
    path: PathKind,
    overlay_enabled: bool,
    playing: bool,
    /// Sentinel `INVALID` when the hardware path is not active. May hold a
    /// stale port after a failed stop; the next play releases it first.
    port: EnginePort,
    stream: Option<StreamHandle>,
    /// Borrowed from the layout manager for the duration of playback.
    surface: SurfaceHandle,
    stats: Option<Arc<StreamStats>>,
    /// Shared with the frame sink; cleared before handles are released so
    /// late deliveries are discarded instead of touching a dead port.
    hardware_active: Arc<AtomicBool>,
    label: String,
}

impl VideoStreamSession {
    /// Create an idle session with a fixed decode mode and stream quality.
    pub fn new(runtime: Arc<VideoRuntime>, decode_mode: DecodeMode, quality: StreamQuality) -> Self {
        let path = decode::resolved_kind(decode_mode, runtime.options().auto_path);
        let count = runtime.register_session();
        debug!("session created ({decode_mode:?}/{quality:?} -> {path:?}), {count} live");
        Self {
            runtime,
            decode_mode,
            quality,
            path,
            overlay_enabled: false,
            playing: false,
            port: EnginePort::INVALID,
            stream: None,
            surface: SurfaceHandle::NULL,
            stats: None,
            hardware_active: Arc::new(AtomicBool::new(false)),
            label: String::new(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Start playback of `channel` on `device`, rendering into `surface`.
    /// Idempotent: an already-playing session is stopped and restarted.
    /// Returns false on any configuration failure, leaving the session idle
    /// with no partially acquired resources.
    pub fn play(
        &mut self,
        device: DeviceHandle,
        channel: u32,
        surface: SurfaceHandle,
        label: &str,
    ) -> bool {
        if device.is_null() || surface.is_null() {
            error!("play('{label}'): null device or surface handle");
            return false;
        }

        if self.playing {
            debug!("play('{label}'): restarting live session");
            self.stop();
            let settle = self.runtime.options().restart_settle();
            if !settle.is_zero() {
                std::thread::sleep(settle);
            }
        }
        self.release_stale_port();

        self.label = label.to_string();
        match self.try_start(device, channel, surface) {
            Ok(()) => {
                self.playing = true;
                self.surface = surface;
                info!("'{label}' ch{channel} playing on {:?} path", self.path);
                true
            }
            Err(e) => {
                error!("play('{label}') ch{channel} failed: {e:#}");
                false
            }
        }
    }

    /// Stop playback and release everything in reverse acquisition order.
    /// No-op when already idle. Each release step is attempted independently;
    /// a failure in one never blocks the rest.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.hardware_active.store(false, Ordering::Release);

        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.runtime.stream_api().stop_stream(stream) {
                warn!("'{}': stream stop failed: {e:#}", self.label);
            }
        }

        // Let in-flight native deliveries drain before the engine handles go.
        let settle = self.runtime.options().stop_settle();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }

        if self.port.is_valid() {
            if let Err(e) = self.runtime.engine().close(self.port) {
                warn!("'{}': engine close failed on {}: {e:#}", self.label, self.port);
            }
            match self.runtime.engine().release_port(self.port) {
                Ok(()) => self.port = EnginePort::INVALID,
                Err(e) => {
                    // Keep the stale handle; the next play retries the release.
                    warn!("'{}': {} release failed: {e:#}", self.label, self.port);
                }
            }
        }

        if !self.surface.is_null() {
            if let Err(e) = self.runtime.stream_api().clear_surface(self.surface) {
                warn!("'{}': surface clear failed: {e:#}", self.label);
            }
            self.surface = SurfaceHandle::NULL;
        }

        // Transient counters go; decode mode, quality and the overlay flag
        // survive for a potential replay.
        self.stats = None;
        self.playing = false;
        info!("'{}' stopped", self.label);
    }

    fn release_stale_port(&mut self) {
        if !self.port.is_valid() {
            return;
        }
        warn!("'{}': releasing stale {} from prior stop", self.label, self.port);
        let engine = self.runtime.engine();
        if let Err(e) = engine.close(self.port) {
            debug!("stale port close: {e:#}");
        }
        if let Err(e) = engine.release_port(self.port) {
            warn!("stale {} release failed: {e:#}", self.port);
        }
        self.port = EnginePort::INVALID;
    }

    fn try_start(
        &mut self,
        device: DeviceHandle,
        channel: u32,
        surface: SurfaceHandle,
    ) -> Result<()> {
        let stats = Arc::new(StreamStats::new(StreamProfile::nominal(self.quality)));
        match self.path {
            PathKind::Software => self.start_software(device, channel, surface)?,
            PathKind::Hardware => self.start_hardware(device, channel, surface, &stats)?,
        }
        self.stats = Some(stats);
        Ok(())
    }

    /// Software path: the vendor renders straight into the surface. No frame
    /// sink is registered; that exclusivity is what keeps the stream from
    /// being processed twice.
    fn start_software(
        &mut self,
        device: DeviceHandle,
        channel: u32,
        surface: SurfaceHandle,
    ) -> Result<()> {
        let request = StreamOpenRequest {
            channel,
            quality: self.quality,
            sink: RenderSink::Direct(surface),
        };
        let stream = self
            .runtime
            .stream_api()
            .open_stream(device, &request)
            .context("software stream open failed")?;

        if self.overlay_enabled {
            if let Err(e) = self.runtime.stream_api().request_overlay(stream, true) {
                warn!("'{}': overlay request failed: {e:#}", self.label);
            }
        }

        self.stream = Some(stream);
        Ok(())
    }

    /// Hardware path: configure the engine, open the stream off-screen and
    /// register the frame sink. Any failure rolls back everything acquired
    /// so far.
    fn start_hardware(
        &mut self,
        device: DeviceHandle,
        channel: u32,
        surface: SurfaceHandle,
        stats: &Arc<StreamStats>,
    ) -> Result<()> {
        let engine = self.runtime.engine().clone();
        let buffer_bytes = decode::ingest_buffer_size(
            self.runtime.active_session_count(),
            self.quality.is_secondary(),
        );
        let port = decode::configure_hardware(
            engine.as_ref(),
            self.runtime.gate(),
            surface,
            buffer_bytes,
        )?;

        let request = StreamOpenRequest {
            channel,
            quality: self.quality,
            sink: RenderSink::Offscreen,
        };
        let stream = match self.runtime.stream_api().open_stream(device, &request) {
            Ok(stream) => stream,
            Err(e) => {
                self.rollback_engine(port);
                return Err(e).context("hardware stream open failed");
            }
        };

        let sink = Arc::new(FrameIngestPipeline::new(
            engine,
            port,
            stats.clone(),
            self.hardware_active.clone(),
            self.runtime.options(),
        ));
        if let Err(e) = self.runtime.stream_api().register_frame_sink(stream, sink) {
            if let Err(e) = self.runtime.stream_api().stop_stream(stream) {
                warn!("rollback stream stop failed: {e:#}");
            }
            self.rollback_engine(port);
            return Err(e).context("frame sink registration failed");
        }

        self.port = port;
        self.stream = Some(stream);
        self.hardware_active.store(true, Ordering::Release);
        Ok(())
    }

    fn rollback_engine(&self, port: EnginePort) {
        let engine = self.runtime.engine();
        if let Err(e) = engine.close(port) {
            debug!("rollback engine close: {e:#}");
        }
        if let Err(e) = engine.release_port(port) {
            warn!("rollback {} release failed: {e:#}", port);
        }
    }

    // ── Overlay ─────────────────────────────────────────────────

    /// Store the overlay flag; apply it live when the active path supports
    /// overlays (software only) and the session is playing. Deferred updates
    /// return true and take effect at the next play.
    pub fn set_overlay(&mut self, enabled: bool) -> bool {
        self.overlay_enabled = enabled;
        if self.playing && self.path == PathKind::Software {
            if let Some(stream) = self.stream {
                return match self.runtime.stream_api().request_overlay(stream, enabled) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("'{}': live overlay update failed: {e:#}", self.label);
                        false
                    }
                };
            }
        }
        true
    }

    pub fn toggle_overlay(&mut self) -> bool {
        self.set_overlay(!self.overlay_enabled)
    }

    // ── Read-only surface ───────────────────────────────────────

    pub fn is_playing(&self) -> bool {
        debug_assert_eq!(self.playing, self.stream.is_some());
        self.playing
    }

    pub fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    pub fn stream_quality(&self) -> StreamQuality {
        self.quality
    }

    pub fn path_kind(&self) -> PathKind {
        self.path
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    /// Statistics snapshot of the current playback, if any.
    pub fn current_statistics(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|s| s.snapshot())
    }

    /// Live statistics handle for the current playback, for monitors.
    pub fn stats_handle(&self) -> Option<Arc<StreamStats>> {
        self.stats.clone()
    }

    pub fn overrun_recovery_count(&self) -> u64 {
        self.stats.as_ref().map_or(0, |s| s.overrun_recoveries())
    }

    pub fn dropped_frame_count(&self) -> u64 {
        self.stats.as_ref().map_or(0, |s| s.dropped_frames())
    }
}

impl Drop for VideoStreamSession {
    fn drop(&mut self) {
        self.stop();
        self.runtime.unregister_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::sdk::{DecodeEngine, EngineVariant, SimulatedSdk, StreamControl};

    fn runtime(sdk: &Arc<SimulatedSdk>) -> Arc<VideoRuntime> {
        VideoRuntime::with_options(
            sdk.clone() as Arc<dyn StreamControl>,
            sdk.clone() as Arc<dyn DecodeEngine>,
            RuntimeOptions::without_settling(),
        )
    }

    #[test]
    fn null_handles_fail_play() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Software, StreamQuality::Primary);

        assert!(!session.play(DeviceHandle::NULL, 0, SurfaceHandle::new(1), "cam"));
        assert!(!session.play(DeviceHandle::new(1), 0, SurfaceHandle::NULL, "cam"));
        assert!(!session.is_playing());
        assert_eq!(sdk.open_stream_count(), 0);
    }

    #[test]
    fn session_counter_tracks_construction_and_drop() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        assert_eq!(rt.active_session_count(), 0);
        {
            let _a = VideoStreamSession::new(rt.clone(), DecodeMode::Software, StreamQuality::Primary);
            let _b =
                VideoStreamSession::new(rt.clone(), DecodeMode::Hardware, StreamQuality::Secondary);
            assert_eq!(rt.active_session_count(), 2);
        }
        assert_eq!(rt.active_session_count(), 0);
    }

    #[test]
    fn software_play_registers_no_sink() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Software, StreamQuality::Primary);

        assert!(session.play(DeviceHandle::new(1), 2, SurfaceHandle::new(3), "cam"));
        assert!(session.is_playing());
        assert_eq!(sdk.registered_sink_count(), 0);
        assert_eq!(sdk.ports_in_use(), 0);
    }

    #[test]
    fn hardware_play_wires_sink_and_port() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Hardware, StreamQuality::Primary);

        assert!(session.play(DeviceHandle::new(1), 0, SurfaceHandle::new(3), "cam"));
        assert_eq!(sdk.registered_sink_count(), 1);
        assert_eq!(sdk.ports_in_use(), 1);

        session.stop();
        assert!(!session.is_playing());
        assert_eq!(sdk.ports_in_use(), 0);
        assert_eq!(sdk.open_stream_count(), 0);
    }

    #[test]
    fn sink_registration_failure_rolls_back_everything() {
        let sdk = SimulatedSdk::new();
        sdk.fail_sink_registration();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Hardware, StreamQuality::Primary);

        assert!(!session.play(DeviceHandle::new(1), 0, SurfaceHandle::new(3), "cam"));
        assert!(!session.is_playing());
        assert_eq!(sdk.ports_in_use(), 0);
        assert_eq!(sdk.open_stream_count(), 0);
        assert!(session.current_statistics().is_none());
    }

    #[test]
    fn hardware_engine_double_failure_fails_play() {
        let sdk = SimulatedSdk::new();
        sdk.fail_variant(EngineVariant::FastPath);
        sdk.fail_variant(EngineVariant::Compat);
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Hardware, StreamQuality::Primary);

        assert!(!session.play(DeviceHandle::new(1), 0, SurfaceHandle::new(3), "cam"));
        assert!(!session.is_playing());
        assert_eq!(sdk.ports_in_use(), 0);
    }

    #[test]
    fn stop_on_idle_is_a_noop() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Software, StreamQuality::Primary);
        session.stop();
        session.stop();
        assert!(!session.is_playing());
    }

    #[test]
    fn restart_reopens_stream() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Software, StreamQuality::Primary);

        assert!(session.play(DeviceHandle::new(1), 0, SurfaceHandle::new(3), "cam"));
        assert!(session.play(DeviceHandle::new(1), 1, SurfaceHandle::new(3), "cam"));
        assert!(session.is_playing());
        assert_eq!(sdk.open_stream_count(), 1);
    }

    #[test]
    fn auto_resolves_to_software_by_default() {
        let sdk = SimulatedSdk::new();
        let rt = runtime(&sdk);
        let mut session = VideoStreamSession::new(rt, DecodeMode::Auto, StreamQuality::Primary);

        assert_eq!(session.path_kind(), PathKind::Software);
        assert!(session.play(DeviceHandle::new(1), 0, SurfaceHandle::new(3), "cam"));
        assert_eq!(sdk.ports_in_use(), 0);
        assert_eq!(sdk.registered_sink_count(), 0);
    }
}
