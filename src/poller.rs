//! Timer-driven vehicle polling.
//!
//! [`spawn`] starts a task that owns the [`MarkerSet`], fetches vehicle
//! positions on a fixed interval, reconciles them, and publishes a
//! [`TrackerFrame`] per poll on a `watch` channel. Fetches run one at a time,
//! so responses are always applied in request order.
//!
//! The task stops when [`PollerHandle::shutdown`] is called, when the handle
//! is dropped, when every frame receiver is gone, or after `max_polls`. A
//! fetch still in flight at shutdown is dropped and its result never reaches
//! the marker set.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::reconciler::{
    MarkerDescriptor, MarkerSet, MarkerUpdate, ReconcileOptions, reconcile,
};
use crate::services::transit_api::TransitApi;
use crate::summary::FeedSummary;

/// Everything a map needs to draw after one poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerFrame {
    /// Sequence number of the poll, starting at 1. Zero before the first poll.
    pub poll: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub markers: Vec<MarkerDescriptor>,
    pub transitions: Vec<MarkerUpdate>,
    pub evicted: Vec<String>,
    pub summary: Option<FeedSummary>,
    /// Set when this poll failed. Markers are carried over from the last
    /// successful poll.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollerOptions {
    pub interval: Duration,
    pub reconcile: ReconcileOptions,
    /// Stop after this many polls. `None` polls until shut down.
    pub max_polls: Option<u64>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            reconcile: ReconcileOptions::default(),
            max_polls: None,
        }
    }
}

/// Owner of a running poller task.
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops polling and waits for the task to exit.
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone, in which case nobody is listening.
        let _ = self.cancel.send(true);
        self.task.await?;
        Ok(())
    }

    /// Waits for the task to finish on its own (e.g. after `max_polls`).
    pub async fn join(self) -> Result<()> {
        let PollerHandle {
            cancel: _cancel,
            task,
        } = self;
        task.await?;
        Ok(())
    }
}

/// Starts polling `api`. Must be called from within a tokio runtime.
pub fn spawn<A>(api: Arc<A>, options: PollerOptions) -> (PollerHandle, watch::Receiver<TrackerFrame>)
where
    A: TransitApi + ?Sized + 'static,
{
    let (frame_tx, frame_rx) = watch::channel(TrackerFrame::default());
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let span = tracing::info_span!(
        "poller",
        interval_ms = options.interval.as_millis() as u64,
    );
    let task = tokio::spawn(run(api, options, frame_tx, cancel_rx).instrument(span));

    (
        PollerHandle {
            cancel: cancel_tx,
            task,
        },
        frame_rx,
    )
}

async fn run<A>(
    api: Arc<A>,
    options: PollerOptions,
    frames: watch::Sender<TrackerFrame>,
    mut cancel: watch::Receiver<bool>,
) where
    A: TransitApi + ?Sized,
{
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut markers = MarkerSet::new();
    let mut poll: u64 = 0;

    info!("Poller started");

    loop {
        if options.max_polls.is_some_and(|max| poll >= max) {
            info!(poll, "Reached poll limit");
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = interval.tick() => {}
        }

        poll += 1;
        let fetch_start = std::time::Instant::now();

        let fetched = tokio::select! {
            biased;
            _ = cancel.changed() => {
                debug!(poll, "Shutdown while fetching, dropping request");
                break;
            }
            result = api.fetch_vehicles() => result,
        };

        // A response that raced with shutdown is discarded.
        if *cancel.borrow() {
            break;
        }

        let elapsed = fetch_start.elapsed();
        if elapsed > options.interval {
            warn!(poll, elapsed_ms = elapsed.as_millis() as u64, "Vehicle fetch was slower than the poll interval");
        }

        let frame = match fetched {
            Ok(vehicles) => {
                let summary = FeedSummary::from_vehicles(&vehicles);
                let result = reconcile(std::mem::take(&mut markers), &vehicles, &options.reconcile);
                debug!(
                    poll,
                    vehicles = vehicles.len(),
                    markers = result.markers.len(),
                    evicted = result.evicted.len(),
                    "Poll reconciled"
                );

                let frame = TrackerFrame {
                    poll,
                    fetched_at: Some(Utc::now()),
                    markers: result.descriptors(),
                    transitions: result.transitions,
                    evicted: result.evicted,
                    summary: Some(summary),
                    error: None,
                };
                markers = result.markers;
                frame
            }
            Err(e) => {
                error!(poll, error = %e, "Vehicle fetch failed");
                TrackerFrame {
                    poll,
                    fetched_at: Some(Utc::now()),
                    markers: markers.descriptors(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        if frames.send(frame).is_err() {
            debug!("All frame receivers dropped");
            break;
        }
    }

    info!(poll, "Poller stopped");
}
