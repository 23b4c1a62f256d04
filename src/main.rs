use camwall::sdk::{DecodeEngine, DeviceHandle, EngineStats, SimulatedSdk, StreamControl, SurfaceHandle};
use camwall::{DecodeMode, RuntimeOptions, StreamQuality, VideoRuntime, VideoStreamSession};
use clap::{Arg, ArgAction, Command};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Headless demo harness: a grid of stream sessions against the simulated
/// SDK, with rolling statistics. Useful for exercising the engine without
/// cameras or vendor binaries attached.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new("camwall")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("channels")
                .short('c')
                .long("channels")
                .value_name("N")
                .help("Number of simultaneous channels to play.")
                .default_value("4"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Decode mode: software, hardware or auto.")
                .default_value("auto"),
        )
        .arg(
            Arg::new("secondary")
                .long("secondary")
                .action(ArgAction::SetTrue)
                .help("Pull the secondary (low-res) stream."),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("Run time before shutdown (0 = until Ctrl-C).")
                .default_value("10"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print statistics snapshots as JSON."),
        )
        .get_matches();

    let channels: usize = matches
        .get_one::<String>("channels")
        .and_then(|v| v.parse().ok())
        .unwrap_or(4);
    let mode = match matches.get_one::<String>("mode").map(String::as_str) {
        Some("software") => DecodeMode::Software,
        Some("hardware") => DecodeMode::Hardware,
        _ => DecodeMode::Auto,
    };
    let quality = if matches.get_flag("secondary") {
        StreamQuality::Secondary
    } else {
        StreamQuality::Primary
    };
    let duration: u64 = matches
        .get_one::<String>("duration")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let json = matches.get_flag("json");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl-C handler");
    }

    let sdk = SimulatedSdk::new();
    sdk.set_engine_stats(EngineStats {
        width: 1920,
        height: 1080,
        fps: 25,
        bitrate_kbps: 4096,
    });
    let runtime = VideoRuntime::with_options(
        sdk.clone() as Arc<dyn StreamControl>,
        sdk.clone() as Arc<dyn DecodeEngine>,
        RuntimeOptions::default(),
    );

    let device = DeviceHandle::new(1);
    let mut sessions = Vec::with_capacity(channels);
    for channel in 0..channels {
        let mut session = VideoStreamSession::new(runtime.clone(), mode, quality);
        let surface = SurfaceHandle::new(100 + channel as u64);
        let label = format!("cam-{channel:02}");
        if !session.play(device, channel as u32, surface, &label) {
            warn!("{label}: play failed");
        }
        sessions.push(session);
    }
    info!(
        "{} of {} channels playing ({:?}/{:?})",
        sessions.iter().filter(|s| s.is_playing()).count(),
        channels,
        mode,
        quality
    );

    // Stand in for the vendor's delivery threads: pump synthetic frames into
    // every registered sink at roughly 25 fps.
    let feeder = {
        let sdk = sdk.clone();
        let running = running.clone();
        tokio::spawn(async move {
            let frame = SimulatedSdk::synthetic_frame(16 * 1024);
            let mut ticker = tokio::time::interval(Duration::from_millis(40));
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                sdk.deliver_frame_to_all(Some(&frame));
            }
        })
    };

    let deadline = (duration > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(duration));
    let mut report = tokio::time::interval(Duration::from_secs(2));
    report.tick().await; // first tick completes immediately
    while running.load(Ordering::SeqCst) {
        if let Some(deadline) = deadline {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
        report.tick().await;
        for (channel, session) in sessions.iter().enumerate() {
            let Some(snapshot) = session.current_statistics() else {
                continue;
            };
            if json {
                match serde_json::to_string(&snapshot) {
                    Ok(line) => println!("{{\"channel\":{channel},\"stats\":{line}}}"),
                    Err(e) => warn!("stats serialization failed: {e}"),
                }
            } else {
                info!("cam-{channel:02}: {snapshot}");
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    let _ = feeder.await;
    for session in &mut sessions {
        session.stop();
    }
    drop(sessions);
    runtime.teardown();
    info!("shutdown complete");
}
