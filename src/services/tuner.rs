//! Trend-driven tuning of the synthesis length.
//!
//! A single background task that periodically consults the learning trend
//! and nudges the shared command length up when learning accelerates and
//! down when it stalls. Scope is deliberately left alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info};

use crate::domain::settings::SynthesisSettings;
use crate::domain::trend::{Trend, TrendTracker};
use crate::infrastructure::shutdown::ShutdownFlag;

#[derive(Debug, Clone)]
pub struct TunerConfig {
    /// Interval between adjustments.
    pub interval: Duration,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
        }
    }
}

impl TunerConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

pub struct Tuner {
    settings: Arc<SynthesisSettings>,
    tracker: Arc<TrendTracker>,
    shutdown: ShutdownFlag,
    config: TunerConfig,
}

impl Tuner {
    pub fn new(
        settings: Arc<SynthesisSettings>,
        tracker: Arc<TrendTracker>,
        shutdown: ShutdownFlag,
        config: TunerConfig,
    ) -> Self {
        Self {
            settings,
            tracker,
            shutdown,
            config,
        }
    }

    /// Run until the termination flag is raised.
    pub async fn run(&self) {
        debug!(interval_ms = self.config.interval.as_millis() as u64, "tuner started");
        let mut ticker = interval(self.config.interval);

        loop {
            ticker.tick().await;
            if self.shutdown.is_triggered() {
                break;
            }

            match self.tracker.verdict() {
                Trend::Up => {
                    let length = self.settings.adjust_length(1);
                    info!(length, "learning trending up, lengthening commands");
                }
                Trend::Down => {
                    let length = self.settings.adjust_length(-1);
                    info!(length, "learning trending down, shortening commands");
                }
                Trend::Flat => {}
            }
        }

        debug!("tuner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::SynthesisLimits;

    fn fixture(length: usize) -> (Arc<SynthesisSettings>, Arc<TrendTracker>, ShutdownFlag) {
        (
            Arc::new(SynthesisSettings::new(SynthesisLimits::default(), length, 50)),
            Arc::new(TrendTracker::new(10)),
            ShutdownFlag::new(),
        )
    }

    #[tokio::test]
    async fn rising_trend_lengthens_until_saturation() {
        let (settings, tracker, shutdown) = fixture(8);
        for v in 1..=10 {
            tracker.push(v);
        }
        let tuner = Tuner::new(
            Arc::clone(&settings),
            Arc::clone(&tracker),
            shutdown.clone(),
            TunerConfig::with_interval(Duration::from_millis(10)),
        );

        let handle = tokio::spawn(async move { tuner.run().await });
        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(settings.snapshot().length, 10);
    }

    #[tokio::test]
    async fn falling_trend_shortens_to_the_floor() {
        let (settings, tracker, shutdown) = fixture(3);
        for v in (1..=10).rev() {
            tracker.push(v * 5);
        }
        let tuner = Tuner::new(
            Arc::clone(&settings),
            Arc::clone(&tracker),
            shutdown.clone(),
            TunerConfig::with_interval(Duration::from_millis(10)),
        );

        let handle = tokio::spawn(async move { tuner.run().await });
        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(settings.snapshot().length, 1);
    }

    #[tokio::test]
    async fn flat_trend_leaves_length_alone() {
        let (settings, tracker, shutdown) = fixture(4);
        for _ in 0..10 {
            tracker.push(5);
        }
        let tuner = Tuner::new(
            Arc::clone(&settings),
            Arc::clone(&tracker),
            shutdown.clone(),
            TunerConfig::with_interval(Duration::from_millis(10)),
        );

        let handle = tokio::spawn(async move { tuner.run().await });
        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(settings.snapshot().length, 4);
    }

    #[tokio::test]
    async fn exits_promptly_on_shutdown() {
        let (settings, tracker, shutdown) = fixture(4);
        let tuner = Tuner::new(
            settings,
            tracker,
            shutdown.clone(),
            TunerConfig::with_interval(Duration::from_millis(20)),
        );
        shutdown.trigger();
        // First tick completes immediately, then the flag is observed.
        tuner.run().await;
    }
}
