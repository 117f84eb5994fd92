//! Output formatting for tracker frames and decoded routes.
//!
//! Supports log summaries, pretty-printing, and JSON lines for a map front end.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::model::DecodedRoute;
use crate::poller::TrackerFrame;
use crate::reconciler::Transition;

/// Logs a one-line summary of a frame.
pub fn log_frame(frame: &TrackerFrame) {
    if let Some(error) = &frame.error {
        warn!(poll = frame.poll, markers = frame.markers.len(), error = %error, "Poll failed, showing last known markers");
        return;
    }

    let animated = frame
        .transitions
        .iter()
        .filter(|u| matches!(u.transition, Transition::Animate { .. }))
        .count();
    let snapped = frame
        .transitions
        .iter()
        .filter(|u| matches!(u.transition, Transition::Snap { .. }))
        .count();
    let (delayed, off_route) = frame
        .summary
        .as_ref()
        .map(|s| (s.delayed, s.off_route))
        .unwrap_or_default();

    info!(
        poll = frame.poll,
        markers = frame.markers.len(),
        snapped,
        animated,
        evicted = frame.evicted.len(),
        delayed,
        off_route,
        "Frame"
    );
}

/// Logs a frame using Rust's debug pretty-print format.
pub fn print_pretty(frame: &TrackerFrame) {
    debug!("{:#?}", frame);
}

/// Writes `value` as a single JSON line.
pub fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Logs one line per route with its point count or decode error.
pub fn log_routes<'a>(routes: impl IntoIterator<Item = &'a DecodedRoute>) {
    for decoded in routes {
        let route = &decoded.route;
        match &decoded.line_points {
            Ok(points) => info!(
                route_id = route.route_id,
                name = %route.description,
                color = %route.map_line_color,
                stops = route.stops.len(),
                points = points.len(),
                "Route"
            ),
            Err(e) => warn!(
                route_id = route.route_id,
                name = %route.description,
                error = %e,
                "Route line could not be decoded"
            ),
        }
    }
}
