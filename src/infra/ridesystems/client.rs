use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_json};
use crate::model::{Route, Vehicle};
use crate::services::transit_api::TransitApi;

const ROUTES_PATH: &str = "/Services/JSONPRelay.svc/GetRoutesForMapWithScheduleWithEncodedLine";
const VEHICLES_PATH: &str = "/Services/JSONPRelay.svc/GetMapVehiclePoints";

/// Client for a RideSystems JSON relay. Every request carries the API key as
/// the `apiKey` query parameter.
pub struct RideSystemsClient<C = BasicClient> {
    base_url: String,
    http: UrlParam<C>,
}

impl RideSystemsClient<BasicClient> {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self::with_client(BasicClient::new()?, base_url, api_key))
    }
}

impl<C: HttpClient> RideSystemsClient<C> {
    pub fn with_client(inner: C, base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: UrlParam::new(inner, "apiKey", api_key),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl<C: HttpClient> TransitApi for RideSystemsClient<C> {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_routes(&self) -> Result<Vec<Route>> {
        let routes: Vec<Route> = fetch_json(&self.http, &self.url(ROUTES_PATH)).await?;
        debug!(count = routes.len(), "Routes received");
        Ok(routes)
    }

    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        let vehicles: Vec<Vehicle> = fetch_json(&self.http, &self.url(VEHICLES_PATH)).await?;
        debug!(count = vehicles.len(), "Vehicle points received");
        Ok(vehicles)
    }
}
