use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::Vehicle;

/// Counts describing one poll of the vehicle feed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub timestamp: DateTime<Utc>,
    pub vehicles: usize,
    pub delayed: usize,
    pub off_route: usize,
    pub with_heading: usize,
    pub moving: usize,
    pub per_route: BTreeMap<i64, usize>,
}

impl FeedSummary {
    pub fn from_vehicles(vehicles: &[Vehicle]) -> Self {
        let mut s = FeedSummary {
            timestamp: Utc::now(),
            vehicles: vehicles.len(),
            ..Default::default()
        };

        for v in vehicles {
            if v.is_delayed {
                s.delayed += 1;
            }

            if !v.is_on_route {
                s.off_route += 1;
            }

            if v.heading.is_some() {
                s.with_heading += 1;
            }

            if v.ground_speed > 0.0 {
                s.moving += 1;
            }

            *s.per_route.entry(v.route_id).or_default() += 1;
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn delayed_pct(&self) -> f64 {
        Self::pct(self.delayed, self.vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: i64, route_id: i64) -> Vehicle {
        Vehicle {
            vehicle_id: id,
            route_id,
            is_on_route: true,
            latitude: 44.56,
            longitude: -123.28,
            ..Default::default()
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(FeedSummary::pct(10, 0), 0.0);
    }

    #[test]
    fn test_from_empty_poll() {
        let summary = FeedSummary::from_vehicles(&[]);
        assert_eq!(summary.vehicles, 0);
        assert!(summary.per_route.is_empty());
        assert_eq!(summary.delayed_pct(), 0.0);
    }

    #[test]
    fn test_from_vehicles_counts_flags() {
        let mut late = vehicle(2, 1);
        late.is_delayed = true;
        late.ground_speed = 8.0;
        let mut lost = vehicle(3, 4);
        lost.is_on_route = false;
        lost.heading = Some(270.0);

        let summary = FeedSummary::from_vehicles(&[vehicle(1, 1), late, lost, vehicle(4, 1)]);

        assert_eq!(summary.vehicles, 4);
        assert_eq!(summary.delayed, 1);
        assert_eq!(summary.off_route, 1);
        assert_eq!(summary.with_heading, 1);
        assert_eq!(summary.moving, 1);
        assert_eq!(summary.per_route.get(&1), Some(&3));
        assert_eq!(summary.per_route.get(&4), Some(&1));
        assert_eq!(summary.delayed_pct(), 25.0);
    }
}
