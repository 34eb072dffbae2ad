//! Payloads carried by the push channel
//!
//! Every frame is `{ "type": "...", "data": { ... } }`. The records here are
//! the `data` shapes; [`crate::realtime::decoder`] picks the shape from the
//! `type` discriminator.

use serde::{Deserialize, Serialize};

use super::types::{Coordinates, TravelStatus};

/// Raw frame before the payload is interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A driver that can currently take trips, with last known position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAvailableResponse {
    pub id: i64,
    pub full_name: String,
    pub location: Coordinates,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub license_plate: Option<String>,
}

/// Initial snapshot of available drivers sent right after connecting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialDriversMessage {
    pub drivers: Vec<DriverAvailableResponse>,
}

/// Driver went offline or became unavailable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOfflineMessage {
    pub driver_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationUpdate {
    pub driver_id: i64,
    pub location: Coordinates,
}

/// Incoming trip request, delivered to the chosen driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequestMessage {
    pub travel_id: i64,
    pub passenger_id: i64,
    pub passenger_name: String,
    #[serde(default)]
    pub passenger_rating: Option<f64>,
    pub origin: Coordinates,
    pub destination: Coordinates,
}

/// Driver's answer, delivered to the citizen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponseMessage {
    pub travel_id: i64,
    pub status: TravelStatus,
    #[serde(default)]
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStatusUpdateMessage {
    pub travel_id: i64,
    pub status: TravelStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Driver position report. Sent by drivers; the server also uses it to ask
/// for a fresh fix, in which case the coordinates are the last known ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdateRequest {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinates> for LocationUpdateRequest {
    fn from(c: Coordinates) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}
