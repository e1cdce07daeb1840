use chrono::{Datelike, Local, Timelike};
use log::{error, info, warn};
use std::future::{self, Future};
use std::time::Duration;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::error::Result;
use crate::indicator::{Color, Indicator};
use crate::output;
use crate::providers::StatusSource;
use crate::schedule::BusinessHours;
use crate::status::CanonicalStatus;

/// Conclusion reached by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub status: CanonicalStatus,
    /// Status label as derived from the run, e.g. "notstarted"
    pub label: String,
    pub color: Color,
}

/// Polls the pipeline and keeps the traffic light in sync.
pub struct Monitor<S> {
    source: S,
    indicator: Indicator,
    hours: BusinessHours,
    interval: Duration,
}

impl<S: StatusSource> Monitor<S> {
    pub fn new(source: S, indicator: Indicator, hours: BusinessHours, interval: Duration) -> Self {
        Self {
            source,
            indicator,
            hours,
            interval,
        }
    }

    /// One pass: gate, lookup, normalize, show.
    ///
    /// Outside business hours the light is switched off and the remote
    /// service is not contacted. A missing status shows as unknown.
    ///
    /// # Errors
    ///
    /// Only faults the status source could not contain.
    pub async fn tick<T: Datelike + Timelike>(&mut self, now: &T) -> Result<TickOutcome> {
        if !self.hours.is_open(now) {
            let status = CanonicalStatus::OffDuty;
            let color = self.indicator.set_color(status);
            return Ok(TickOutcome {
                status,
                label: status.to_string(),
                color,
            });
        }

        let (status, label) = match self.source.latest_status().await? {
            Some(build) => (build.canonical(), build.overall()),
            None => (CanonicalStatus::Unknown, CanonicalStatus::Unknown.to_string()),
        };

        let color = self.indicator.set_color(status);

        Ok(TickOutcome {
            status,
            label,
            color,
        })
    }

    /// Tick forever, sleeping `interval` in between.
    ///
    /// Returns on Ctrl-C or SIGTERM (observed while sleeping) or with the
    /// first fault a tick reports. The indicator is disposed on every path.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`Monitor::run`], stopping when `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            let outcome = match self.tick(&Local::now()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Monitoring stopped: {e}");
                    break Err(e);
                }
            };

            let wait = chrono::Duration::from_std(self.interval)
                .unwrap_or_else(|_| chrono::Duration::zero());
            let next_check = Local::now() + wait;
            output::print_tick(&outcome, next_check);

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
            }
        };

        self.indicator.dispose();
        result
    }
}

/// Completes on Ctrl-C or SIGTERM.
///
/// The SIGTERM handler is installed before the first poll so a signal that
/// arrives during a tick is not lost. A handler that cannot be installed
/// never fires.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {e}");
            None
        }
    };

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {e}");
                future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match sigterm {
                Some(mut stream) => {
                    stream.recv().await;
                }
                None => future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("Received SIGINT"),
            () = terminate => info!("Received SIGTERM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::BuildLightError;
    use crate::indicator::testing::{Event, RecordingLines};
    use crate::indicator::{CanceledColor, Level, Pins};
    use crate::providers::BuildStatus;

    const PINS: Pins = Pins {
        red: 26,
        yellow: 20,
        green: 21,
    };

    enum Reply {
        Status(&'static str, Option<&'static str>),
        Nothing,
        Fault,
    }

    struct FakeSource {
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        async fn latest_status(&self) -> Result<Option<BuildStatus>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Status(status, result) => Ok(Some(BuildStatus {
                    status: Some(status.to_string()),
                    result: result.map(ToString::to_string),
                })),
                Reply::Nothing => Ok(None),
                Reply::Fault => Err(BuildLightError::Fault("connection pool poisoned".into())),
            }
        }
    }

    struct Harness {
        monitor: Monitor<FakeSource>,
        lines: RecordingLines,
        calls: Arc<AtomicUsize>,
    }

    fn harness(reply: Reply, hours: BusinessHours) -> Harness {
        let lines = RecordingLines::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let indicator = Indicator::new(
            Box::new(lines.clone()),
            PINS,
            Duration::ZERO,
            CanceledColor::Red,
        );
        let source = FakeSource {
            reply,
            calls: Arc::clone(&calls),
        };

        Harness {
            monitor: Monitor::new(source, indicator, hours, Duration::from_secs(60)),
            lines,
            calls,
        }
    }

    // Monday 2026-10-19
    fn monday_at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn office_hours() -> BusinessHours {
        BusinessHours {
            start_hour: 8,
            end_hour: 17,
            days_of_week: vec!["Monday".to_string()],
            end_hour_inclusive: false,
        }
    }

    fn rgy(lines: &RecordingLines) -> Vec<Option<Level>> {
        lines.levels(&[PINS.red, PINS.yellow, PINS.green])
    }

    #[tokio::test]
    async fn test_open_gate_success_shows_green() {
        let mut h = harness(Reply::Status("completed", Some("succeeded")), office_hours());

        let outcome = h.monitor.tick(&monday_at(9)).await.unwrap();

        assert_eq!(outcome.status, CanonicalStatus::Succeeded);
        assert_eq!(outcome.color, Color::Green);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            rgy(&h.lines),
            vec![Some(Level::High), Some(Level::High), Some(Level::Low)]
        );
    }

    #[tokio::test]
    async fn test_closed_gate_turns_off_without_remote_call() {
        let mut h = harness(Reply::Status("completed", Some("succeeded")), office_hours());

        let outcome = h.monitor.tick(&monday_at(17)).await.unwrap();

        assert_eq!(outcome.status, CanonicalStatus::OffDuty);
        assert_eq!(outcome.color, Color::Off);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            rgy(&h.lines),
            vec![Some(Level::High), Some(Level::High), Some(Level::High)]
        );
    }

    #[tokio::test]
    async fn test_missing_status_is_unknown_and_off() {
        let mut h = harness(Reply::Nothing, BusinessHours::default());

        let outcome = h.monitor.tick(&monday_at(3)).await.unwrap();

        assert_eq!(outcome.status, CanonicalStatus::Unknown);
        assert_eq!(outcome.label, "unknown");
        assert_eq!(outcome.color, Color::Off);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_state_keeps_label() {
        let mut h = harness(Reply::Status("notStarted", None), BusinessHours::default());

        let outcome = h.monitor.tick(&monday_at(10)).await.unwrap();

        assert_eq!(outcome.status, CanonicalStatus::Unknown);
        assert_eq!(outcome.label, "notstarted");
        assert_eq!(outcome.color, Color::Off);
    }

    #[tokio::test]
    async fn test_in_progress_shows_yellow() {
        let mut h = harness(Reply::Status("inProgress", None), office_hours());

        let outcome = h.monitor.tick(&monday_at(12)).await.unwrap();

        assert_eq!(outcome.color, Color::Yellow);
    }

    #[tokio::test]
    async fn test_every_tick_overwrites_the_light() {
        let mut h = harness(Reply::Status("completed", Some("failed")), office_hours());

        h.monitor.tick(&monday_at(16)).await.unwrap();
        assert_eq!(rgy(&h.lines)[0], Some(Level::Low));

        h.monitor.tick(&monday_at(17)).await.unwrap();
        assert_eq!(
            rgy(&h.lines),
            vec![Some(Level::High), Some(Level::High), Some(Level::High)]
        );
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fault_propagates_from_tick() {
        let mut h = harness(Reply::Fault, BusinessHours::default());

        let err = h.monitor.tick(&monday_at(9)).await.unwrap_err();
        assert!(matches!(err, BuildLightError::Fault(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_fault_and_disposes_indicator() {
        let h = harness(Reply::Fault, BusinessHours::default());
        let lines = h.lines.clone();

        let result = h.monitor.run().await;

        assert!(result.is_err());
        assert_eq!(lines.release_count(), 1);
        assert_eq!(lines.events().last(), Some(&Event::Release));
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_and_disposes_indicator() {
        let h = harness(
            Reply::Status("completed", Some("succeeded")),
            BusinessHours::default(),
        );
        let lines = h.lines.clone();
        let calls = Arc::clone(&h.calls);

        let result = h.monitor.run_until(future::ready(())).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lines.announced(), vec![Color::Green]);
        assert_eq!(lines.release_count(), 1);
        assert_eq!(lines.events().last(), Some(&Event::Release));
    }
}
