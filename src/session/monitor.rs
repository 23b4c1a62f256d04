//! Periodic diagnostic signals for one playing stream
//!
//! Persistent ingestion errors never stop playback; instead a monitor samples
//! the stream's statistics on an interval and emits alerts so a collaborator
//! (status bar, operator console) can decide whether to restart the channel.

use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::stats::StreamStats;

/// Diagnostic conditions surfaced by [`SessionMonitor`].
#[derive(Debug, Clone)]
pub enum StreamAlert {
    /// No frame arrived within the stall threshold.
    Stalled { duration: Duration },
    /// Dropped deliveries exceed the configured share of total frames.
    HighDropRate { rate: f64 },
    /// The consecutive ingestion-error streak keeps growing.
    DecodeErrors { consecutive: u64 },
    /// Overrun recoveries since the previous check.
    OverrunBurst { count: u64 },
}

impl std::fmt::Display for StreamAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamAlert::Stalled { duration } => write!(f, "stream stalled for {duration:?}"),
            StreamAlert::HighDropRate { rate } => write!(f, "high drop rate: {rate:.2}%"),
            StreamAlert::DecodeErrors { consecutive } => {
                write!(f, "{consecutive} consecutive decode errors")
            }
            StreamAlert::OverrunBurst { count } => {
                write!(f, "{count} overrun recoveries since last check")
            }
        }
    }
}

/// Samples a stream's statistics and reports alerts over a channel.
pub struct SessionMonitor {
    stats: Arc<StreamStats>,
    alert_tx: mpsc::Sender<StreamAlert>,
    check_interval: Duration,
    stall_threshold: Duration,
    drop_rate_threshold: f64,
    error_streak_threshold: u64,
}

impl SessionMonitor {
    pub fn new(stats: Arc<StreamStats>, alert_tx: mpsc::Sender<StreamAlert>) -> Self {
        Self {
            stats,
            alert_tx,
            check_interval: Duration::from_secs(5),
            stall_threshold: Duration::from_secs(5),
            drop_rate_threshold: 10.0,
            error_streak_threshold: 25,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn with_drop_rate_threshold(mut self, threshold: f64) -> Self {
        self.drop_rate_threshold = threshold;
        self
    }

    pub fn with_error_streak_threshold(mut self, threshold: u64) -> Self {
        self.error_streak_threshold = threshold;
        self
    }

    /// Run until the alert receiver is dropped.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_overruns = self.stats.overrun_recoveries();

        loop {
            interval.tick().await;

            if self.stats.is_stalled(self.stall_threshold) {
                if self
                    .alert_tx
                    .send(StreamAlert::Stalled {
                        duration: self.stall_threshold,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
            }

            let frames = self.stats.frames();
            let dropped = self.stats.dropped_frames();
            if frames > 0 {
                let rate = dropped as f64 / frames as f64 * 100.0;
                if rate > self.drop_rate_threshold {
                    if self
                        .alert_tx
                        .send(StreamAlert::HighDropRate { rate })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }

            let streak = self.stats.consecutive_errors();
            if streak >= self.error_streak_threshold {
                warn!("persistent decode errors: {streak} consecutive");
                if self
                    .alert_tx
                    .send(StreamAlert::DecodeErrors { consecutive: streak })
                    .await
                    .is_err()
                {
                    return;
                }
            }

            let overruns = self.stats.overrun_recoveries();
            if overruns > last_overruns {
                let count = overruns - last_overruns;
                last_overruns = overruns;
                if self
                    .alert_tx
                    .send(StreamAlert::OverrunBurst { count })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StreamProfile, StreamQuality};

    fn stats() -> Arc<StreamStats> {
        Arc::new(StreamStats::new(StreamProfile::nominal(
            StreamQuality::Primary,
        )))
    }

    #[tokio::test]
    async fn overrun_burst_alert() {
        let stats = stats();
        stats.record_frame(100); // not stalled
        for _ in 0..5 {
            stats.record_overrun();
        }

        let (tx, mut rx) = mpsc::channel(8);
        let monitor = SessionMonitor::new(stats.clone(), tx)
            .with_check_interval(Duration::from_millis(10))
            .with_stall_threshold(Duration::from_secs(60));
        tokio::spawn(async move { monitor.run().await });

        let alert = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match alert {
            StreamAlert::OverrunBurst { count } => assert_eq!(count, 5),
            other => panic!("unexpected alert: {other}"),
        }
    }

    #[tokio::test]
    async fn decode_error_streak_alert() {
        let stats = stats();
        stats.record_frame(100);
        for _ in 0..30 {
            stats.record_error();
        }

        let (tx, mut rx) = mpsc::channel(8);
        let monitor = SessionMonitor::new(stats.clone(), tx)
            .with_check_interval(Duration::from_millis(10))
            .with_stall_threshold(Duration::from_secs(60))
            .with_error_streak_threshold(25);
        tokio::spawn(async move { monitor.run().await });

        let alert = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match alert {
            StreamAlert::DecodeErrors { consecutive } => assert!(consecutive >= 30),
            other => panic!("unexpected alert: {other}"),
        }
    }

    #[tokio::test]
    async fn monitor_exits_when_receiver_dropped() {
        let stats = stats();
        for _ in 0..3 {
            stats.record_overrun();
        }
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let monitor =
            SessionMonitor::new(stats, tx).with_check_interval(Duration::from_millis(5));
        // must return, not loop forever
        tokio::time::timeout(Duration::from_secs(1), monitor.run())
            .await
            .unwrap();
    }
}
