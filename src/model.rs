//! Vendor JSON models for the shuttle routes and vehicle position endpoints.
//!
//! Field names follow the vendor's PascalCase payloads. Anything the map does
//! not strictly need is defaulted so a sparse payload still deserializes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::polyline::{self, DecodeError, GeoPoint};

/// Treats an explicit JSON `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A stop on a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Stop {
    #[serde(rename = "AddressID", deserialize_with = "null_as_default")]
    pub address_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub longitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub line1: String,
    #[serde(deserialize_with = "null_as_default")]
    pub line2: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "RouteID", deserialize_with = "null_as_default")]
    pub route_id: i64,
    #[serde(rename = "RouteStopID", deserialize_with = "null_as_default")]
    pub route_stop_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub seconds_at_stop: i64,
    // The vendor misspells this field in some payloads.
    #[serde(alias = "SecodnsToNextStop", deserialize_with = "null_as_default")]
    pub seconds_to_next_stop: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub sign_verbiage: String,
}

/// A route as returned by the routes endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    #[serde(rename = "RouteID", deserialize_with = "null_as_default")]
    pub route_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "ETATypeID", deserialize_with = "null_as_default")]
    pub eta_type_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub map_latitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub map_longitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub map_line_color: String,
    #[serde(rename = "StopTimesPDFLink", deserialize_with = "null_as_default")]
    pub stop_times_pdf_link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub stops: Vec<Stop>,
    pub encoded_polyline: Option<String>,
}

impl Route {
    /// Decodes this route's line. A missing or empty polyline is an empty line.
    pub fn decode_line(&self) -> Result<Vec<GeoPoint>, DecodeError> {
        match self.encoded_polyline.as_deref() {
            Some(encoded) => polyline::decode(encoded),
            None => Ok(Vec::new()),
        }
    }
}

/// A route paired with its decoded line.
///
/// The line is decoded once per fetch. A malformed polyline only affects the
/// route it belongs to.
#[derive(Debug, Clone)]
pub struct DecodedRoute {
    pub route: Route,
    pub line_points: Result<Vec<GeoPoint>, DecodeError>,
}

impl DecodedRoute {
    pub fn from_route(route: Route) -> Self {
        let line_points = route.decode_line();
        Self { route, line_points }
    }
}

/// Decodes the line of every route, isolating failures per route.
pub fn decode_routes(routes: Vec<Route>) -> Vec<DecodedRoute> {
    routes.into_iter().map(DecodedRoute::from_route).collect()
}

/// A live vehicle position from the vehicle points endpoint.
///
/// Only the id and coordinates are required; a vehicle without them cannot
/// be placed on the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vehicle {
    #[serde(rename = "VehicleID")]
    pub vehicle_id: i64,
    #[serde(rename = "RouteID", default, deserialize_with = "null_as_default")]
    pub route_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seconds: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ground_speed: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_delayed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_on_route: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl Vehicle {
    /// Marker identity for this vehicle.
    pub fn id(&self) -> String {
        self.vehicle_id.to_string()
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_from_vendor_json() {
        let json = r#"{
            "VehicleID": 7,
            "RouteID": 3,
            "Seconds": 2,
            "Name": "Bus 7",
            "GroundSpeed": 12.5,
            "Heading": 90,
            "IsDelayed": false,
            "IsOnRoute": true,
            "Latitude": 44.565,
            "Longitude": -123.284
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.id(), "7");
        assert_eq!(vehicle.route_id, 3);
        assert_eq!(vehicle.heading, Some(90.0));
        assert_eq!(vehicle.position(), GeoPoint::new(44.565, -123.284));
    }

    #[test]
    fn test_vehicle_without_optional_fields() {
        let json = r#"{"VehicleID": 12, "Latitude": 44.5, "Longitude": -123.2}"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.id(), "12");
        assert_eq!(vehicle.heading, None);
        assert!(!vehicle.is_delayed);
    }

    #[test]
    fn test_vehicle_missing_coordinates_is_rejected() {
        let json = r#"{"VehicleID": 12}"#;
        assert!(serde_json::from_str::<Vehicle>(json).is_err());
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"[
            {"VehicleID": 7, "Name": null, "RouteID": null, "GroundSpeed": null,
             "IsDelayed": null, "Latitude": 44.565, "Longitude": -123.284},
            {"VehicleID": 8, "Name": "Bus 8", "Latitude": 44.57, "Longitude": -123.28}
        ]"#;
        let vehicles: Vec<Vehicle> = serde_json::from_str(json).unwrap();
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].name, "");
        assert_eq!(vehicles[0].route_id, 0);
        assert!(!vehicles[0].is_delayed);
        assert_eq!(vehicles[1].name, "Bus 8");
    }

    #[test]
    fn test_route_with_null_strings_and_stops() {
        let json = r#"[
            {"RouteID": 1, "Description": "North", "StopTimesPDFLink": null,
             "MapLineColor": null, "Stops": null, "EncodedPolyline": null},
            {"RouteID": 2, "Description": "South",
             "Stops": [{"Description": null, "SignVerbiage": null, "Latitude": 44.56}]}
        ]"#;
        let routes: Vec<Route> = serde_json::from_str(json).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].stop_times_pdf_link, "");
        assert!(routes[0].stops.is_empty());
        assert_eq!(routes[1].stops[0].description, "");
        assert_eq!(routes[1].stops[0].latitude, 44.56);
    }

    #[test]
    fn test_stop_accepts_misspelled_field() {
        let json = r#"{"Description": "Library", "SecodnsToNextStop": 45}"#;
        let stop: Stop = serde_json::from_str(json).unwrap();
        assert_eq!(stop.seconds_to_next_stop, 45);
    }

    #[test]
    fn test_decode_routes_isolates_failures() {
        let routes = vec![
            Route {
                route_id: 1,
                description: "North".into(),
                encoded_polyline: Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@".into()),
                ..Default::default()
            },
            Route {
                route_id: 2,
                description: "Broken".into(),
                encoded_polyline: Some("_p~iF".into()),
                ..Default::default()
            },
            Route {
                route_id: 3,
                description: "No line".into(),
                encoded_polyline: None,
                ..Default::default()
            },
        ];

        let decoded = decode_routes(routes);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].line_points.as_ref().unwrap().len(), 3);
        assert!(decoded[1].line_points.is_err());
        assert!(decoded[2].line_points.as_ref().unwrap().is_empty());
    }
}
