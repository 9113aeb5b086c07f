use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::config::LivenessConfig;
use crate::connection::ConnectionId;
use crate::hub::{Delivery, Hub, SharedHub};
use crate::websockets::OutboundEvent;

/// A `ping` for every registered device and client whose transport is open
pub fn heartbeat(hub: &Hub, now: DateTime<Utc>) -> Vec<Delivery> {
    let ping = OutboundEvent::ping(now);
    hub.registry()
        .registered_connection_ids()
        .into_iter()
        .filter(|id| hub.registry().get(id).is_some_and(|c| c.is_open()))
        .map(|id| Delivery::new(id, ping.clone()))
        .collect()
}

/// Result of one staleness sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub evicted: Vec<ConnectionId>,
    /// Notifications produced by the evictions (`device_disconnected`)
    pub deliveries: Vec<Delivery>,
}

/// Evicts every connection silent for longer than `stale_timeout`, running the
/// same cleanup as an explicit disconnect for each
pub fn sweep_stale(hub: &mut Hub, now: DateTime<Utc>, stale_timeout: Duration) -> SweepReport {
    let Some(cutoff) = chrono::Duration::from_std(stale_timeout)
        .ok()
        .and_then(|timeout| now.checked_sub_signed(timeout))
    else {
        return SweepReport::default();
    };

    let stale = hub.registry().stale_connections(cutoff);
    let mut report = SweepReport::default();
    for id in stale {
        if let Some(connection) = hub.registry().get(&id) {
            info!(
                connection_id = %id,
                role = %connection.role,
                identity = connection.identity.as_deref().unwrap_or("-"),
                last_seen = %connection.last_seen,
                "Evicting stale connection"
            );
        }
        report.deliveries.extend(hub.disconnect(&id));
        report.evicted.push(id);
    }
    report
}

/// Runs the heartbeat and the staleness sweep on their own timers.
///
/// Both take the same hub lock as message handling, so a tick never observes
/// a half-applied mutation.
pub struct LivenessSupervisor {
    hub: SharedHub,
    config: LivenessConfig,
}

/// Keeps the supervisor's timer tasks alive; `abort` stops both
pub struct LivenessHandle {
    heartbeat: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

impl LivenessHandle {
    pub fn abort(&self) {
        self.heartbeat.abort();
        self.sweep.abort();
    }
}

impl LivenessSupervisor {
    pub fn new(hub: SharedHub, config: LivenessConfig) -> Self {
        Self { hub, config }
    }

    /// Pings every registered connection once; returns how many pings were sent
    pub async fn heartbeat_once(&self) -> usize {
        let hub = self.hub.lock().await;
        let deliveries = heartbeat(&hub, Utc::now());
        hub.dispatch(deliveries)
    }

    /// Runs one staleness sweep; returns the evicted connections
    pub async fn sweep_once(&self) -> Vec<ConnectionId> {
        let mut hub = self.hub.lock().await;
        let report = sweep_stale(&mut hub, Utc::now(), self.config.stale_timeout);
        hub.dispatch(report.deliveries);
        report.evicted
    }

    /// Spawns both timer tasks
    #[instrument(skip(self))]
    pub fn start(self) -> LivenessHandle {
        info!(
            ping_interval_secs = self.config.ping_interval.as_secs_f64(),
            sweep_interval_secs = self.config.sweep_interval.as_secs_f64(),
            stale_timeout_secs = self.config.stale_timeout.as_secs_f64(),
            "Starting liveness supervisor"
        );

        let supervisor = Arc::new(self);
        LivenessHandle {
            heartbeat: tokio::spawn(supervisor.clone().run_heartbeat()),
            sweep: tokio::spawn(supervisor.run_sweep()),
        }
    }

    async fn run_heartbeat(self: Arc<Self>) {
        let mut ticker = ticker(self.config.ping_interval);
        loop {
            ticker.tick().await;
            let sent = self.heartbeat_once().await;
            debug!(sent = sent, "Heartbeat sent");
        }
    }

    async fn run_sweep(self: Arc<Self>) {
        let mut ticker = ticker(self.config.sweep_interval);
        loop {
            ticker.tick().await;
            let evicted = self.sweep_once().await;
            if !evicted.is_empty() {
                info!(evicted = evicted.len(), "Stale connections evicted");
            }
        }
    }
}

/// Interval whose first tick is one full period away
fn ticker(period: Duration) -> tokio::time::Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
