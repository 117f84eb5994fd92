//! Maps each poll of vehicle positions onto persistent map markers.
//!
//! [`reconcile`] is a pure reducer: it takes the previous [`MarkerSet`] by
//! value and returns the updated set together with the transition every
//! vehicle in the poll should play. A vehicle seen for the first time snaps
//! into place; a known vehicle animates from its stored position to the new
//! one.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::model::Vehicle;
use crate::polyline::GeoPoint;

/// Default length of a marker animation between two polls.
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(1000);

/// Animated state of a single vehicle marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerState {
    /// Target of the latest transition.
    pub position: GeoPoint,
    pub heading: Option<f64>,
    /// Consecutive polls this vehicle has been absent from.
    pub missed_polls: u32,
}

/// Where a marker stands before a poll is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerPhase<'a> {
    Uninitialized,
    Tracking(&'a MarkerState),
}

/// Markers keyed by vehicle id. Ordered so rendered output is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    markers: BTreeMap<String, MarkerState>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, id: &str) -> MarkerPhase<'_> {
        match self.markers.get(id) {
            Some(state) => MarkerPhase::Tracking(state),
            None => MarkerPhase::Uninitialized,
        }
    }

    pub fn get(&self, id: &str) -> Option<&MarkerState> {
        self.markers.get(id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MarkerState)> {
        self.markers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render-ready descriptors for every marker, including retained ones.
    pub fn descriptors(&self) -> Vec<MarkerDescriptor> {
        self.iter()
            .map(|(id, state)| MarkerDescriptor {
                id: id.to_string(),
                coordinate: state.position,
                heading: state.heading,
                icon: MarkerIcon::Bus,
            })
            .collect()
    }
}

/// How a marker moves in response to a poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// First sighting: place the marker without animating.
    Snap { to: GeoPoint },
    /// Move from the previous target to the new one.
    Animate {
        from: GeoPoint,
        to: GeoPoint,
        #[serde(with = "duration_ms")]
        duration: Duration,
    },
    /// Same target as before.
    Hold { at: GeoPoint },
}

impl Transition {
    pub fn target(&self) -> GeoPoint {
        match *self {
            Transition::Snap { to } => to,
            Transition::Animate { to, .. } => to,
            Transition::Hold { at } => at,
        }
    }

    /// Marker position `elapsed` into the transition, linearly interpolated.
    pub fn position_at(&self, elapsed: Duration) -> GeoPoint {
        match *self {
            Transition::Animate { from, to, duration } => {
                if duration.is_zero() || elapsed >= duration {
                    return to;
                }
                let t = elapsed.as_secs_f64() / duration.as_secs_f64();
                GeoPoint::new(
                    from.latitude + (to.latitude - from.latitude) * t,
                    from.longitude + (to.longitude - from.longitude) * t,
                )
            }
            other => other.target(),
        }
    }
}

/// A transition for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerUpdate {
    pub id: String,
    pub heading: Option<f64>,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerIcon {
    Bus,
}

/// What the map widget draws for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub id: String,
    pub coordinate: GeoPoint,
    pub heading: Option<f64>,
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    pub animation: Duration,
    /// Drop a marker after this many consecutive polls without its vehicle.
    /// `None` keeps markers forever. `Some(0)` evicts on the first miss, the
    /// same as `Some(1)`; the config layer rejects it.
    pub evict_after_missed_polls: Option<u32>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            animation: DEFAULT_ANIMATION,
            evict_after_missed_polls: None,
        }
    }
}

/// Result of applying one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub markers: MarkerSet,
    /// One entry per distinct vehicle id in the poll, in poll order.
    pub transitions: Vec<MarkerUpdate>,
    pub evicted: Vec<String>,
}

impl Reconciliation {
    pub fn descriptors(&self) -> Vec<MarkerDescriptor> {
        self.markers.descriptors()
    }
}

/// Applies a freshly fetched vehicle list to the previous marker set.
///
/// If an id appears more than once in `vehicles`, the last occurrence wins.
pub fn reconcile(
    mut state: MarkerSet,
    vehicles: &[Vehicle],
    options: &ReconcileOptions,
) -> Reconciliation {
    let mut transitions: Vec<MarkerUpdate> = Vec::with_capacity(vehicles.len());
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for vehicle in vehicles {
        let id = vehicle.id();
        let target = vehicle.position();

        let (transition, previous_heading) = match state.phase(&id) {
            MarkerPhase::Uninitialized => (Transition::Snap { to: target }, None),
            MarkerPhase::Tracking(current) if current.position == target => {
                (Transition::Hold { at: target }, current.heading)
            }
            MarkerPhase::Tracking(current) => (
                Transition::Animate {
                    from: current.position,
                    to: target,
                    duration: options.animation,
                },
                current.heading,
            ),
        };

        let heading = vehicle.heading.or(previous_heading);
        state.markers.insert(
            id.clone(),
            MarkerState {
                position: target,
                heading,
                missed_polls: 0,
            },
        );

        let update = MarkerUpdate {
            id: id.clone(),
            heading,
            transition,
        };
        match seen.get(&id).copied() {
            // A repeated id inside one poll replaces its earlier update but
            // keeps the origin of the first one, so the marker animates once.
            Some(slot) => {
                let first = transitions[slot].transition;
                transitions[slot] = MarkerUpdate {
                    transition: merge(first, target, options.animation),
                    ..update
                };
            }
            None => {
                seen.insert(id, transitions.len());
                transitions.push(update);
            }
        }
    }

    let mut evicted = Vec::new();
    state.markers.retain(|id, marker| {
        if seen.contains_key(id) {
            return true;
        }
        marker.missed_polls = marker.missed_polls.saturating_add(1);
        match options.evict_after_missed_polls {
            Some(limit) if marker.missed_polls >= limit => {
                evicted.push(id.clone());
                false
            }
            _ => true,
        }
    });

    Reconciliation {
        markers: state,
        transitions,
        evicted,
    }
}

fn merge(first: Transition, target: GeoPoint, animation: Duration) -> Transition {
    match first {
        Transition::Snap { .. } => Transition::Snap { to: target },
        Transition::Animate { from, .. } | Transition::Hold { at: from } if from == target => {
            Transition::Hold { at: target }
        }
        Transition::Animate { from, .. } | Transition::Hold { at: from } => Transition::Animate {
            from,
            to: target,
            duration: animation,
        },
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
