//! Trait for a source of shuttle routes and live vehicle positions.

use anyhow::Result;

use crate::model::{Route, Vehicle};

/// Abstraction over the vendor feed (e.g., the RideSystems JSON relay).
#[async_trait::async_trait]
pub trait TransitApi: Send + Sync {
    /// Returns every route with its encoded line and stops.
    async fn fetch_routes(&self) -> Result<Vec<Route>>;

    /// Returns the current position of every vehicle in service.
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>>;
}
