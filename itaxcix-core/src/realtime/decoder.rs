//! Push-channel message decoding
//!
//! A text frame is `{ "type": "...", "data": ... }`. The `type` picks one of
//! a fixed set of payload shapes. Anything else is a [`DecodeError`]; callers
//! log and drop those frames.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::{
    DriverAvailableResponse, DriverLocationUpdate, DriverOfflineMessage, InitialDriversMessage,
    LocationUpdateRequest, TripRequestMessage, TripResponseMessage, TripStatusUpdateMessage,
    WebSocketEnvelope,
};

/// Logical message type carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    DriverAvailable,
    DriverOffline,
    DriverLocationUpdate,
    InitialDrivers,
    TripRequest,
    TripResponse,
    TripStatusUpdate,
    LocationUpdateRequest,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::DriverAvailable,
        MessageKind::DriverOffline,
        MessageKind::DriverLocationUpdate,
        MessageKind::InitialDrivers,
        MessageKind::TripRequest,
        MessageKind::TripResponse,
        MessageKind::TripStatusUpdate,
        MessageKind::LocationUpdateRequest,
    ];

    /// Wire name used when encoding
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::DriverAvailable => "driver_available",
            MessageKind::DriverOffline => "driver_offline",
            MessageKind::DriverLocationUpdate => "driver_location_update",
            MessageKind::InitialDrivers => "initial_drivers",
            MessageKind::TripRequest => "trip_request",
            MessageKind::TripResponse => "trip_response",
            MessageKind::TripStatusUpdate => "trip_status_update",
            MessageKind::LocationUpdateRequest => "location_update_request",
        }
    }

    pub fn from_type(message_type: &str) -> Option<Self> {
        match message_type {
            "driver_unavailable" => Some(MessageKind::DriverOffline),
            other => Self::ALL.into_iter().find(|k| k.as_str() == other),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded push message
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    DriverAvailable(DriverAvailableResponse),
    DriverOffline(DriverOfflineMessage),
    DriverLocationUpdate(DriverLocationUpdate),
    InitialDrivers(InitialDriversMessage),
    TripRequest(TripRequestMessage),
    TripResponse(TripResponseMessage),
    TripStatusUpdate(TripStatusUpdateMessage),
    LocationUpdateRequest(LocationUpdateRequest),
}

impl RealtimeMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            RealtimeMessage::DriverAvailable(_) => MessageKind::DriverAvailable,
            RealtimeMessage::DriverOffline(_) => MessageKind::DriverOffline,
            RealtimeMessage::DriverLocationUpdate(_) => MessageKind::DriverLocationUpdate,
            RealtimeMessage::InitialDrivers(_) => MessageKind::InitialDrivers,
            RealtimeMessage::TripRequest(_) => MessageKind::TripRequest,
            RealtimeMessage::TripResponse(_) => MessageKind::TripResponse,
            RealtimeMessage::TripStatusUpdate(_) => MessageKind::TripStatusUpdate,
            RealtimeMessage::LocationUpdateRequest(_) => MessageKind::LocationUpdateRequest,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or no string `type` field
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Known type whose `data` does not match the expected shape
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a raw text frame
pub fn decode(text: &str) -> Result<RealtimeMessage, DecodeError> {
    let envelope: WebSocketEnvelope =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = MessageKind::from_type(&envelope.message_type)
        .ok_or_else(|| DecodeError::UnknownType(envelope.message_type.clone()))?;

    let data = envelope.data;
    let message = match kind {
        MessageKind::DriverAvailable => RealtimeMessage::DriverAvailable(payload(kind, data)?),
        MessageKind::DriverOffline => RealtimeMessage::DriverOffline(payload(kind, data)?),
        MessageKind::DriverLocationUpdate => {
            RealtimeMessage::DriverLocationUpdate(payload(kind, data)?)
        }
        // The server sends either a bare array or `{ "drivers": [...] }`
        MessageKind::InitialDrivers => {
            let snapshot = if data.is_array() {
                InitialDriversMessage {
                    drivers: payload(kind, data)?,
                }
            } else {
                payload(kind, data)?
            };
            RealtimeMessage::InitialDrivers(snapshot)
        }
        MessageKind::TripRequest => RealtimeMessage::TripRequest(payload(kind, data)?),
        MessageKind::TripResponse => RealtimeMessage::TripResponse(payload(kind, data)?),
        MessageKind::TripStatusUpdate => RealtimeMessage::TripStatusUpdate(payload(kind, data)?),
        MessageKind::LocationUpdateRequest => {
            RealtimeMessage::LocationUpdateRequest(payload(kind, data)?)
        }
    };

    Ok(message)
}

fn payload<T: DeserializeOwned>(kind: MessageKind, data: serde_json::Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Encode an outgoing `{ type, data }` frame
pub fn encode<T: Serialize>(kind: MessageKind, data: &T) -> Result<String, serde_json::Error> {
    let envelope = WebSocketEnvelope {
        message_type: kind.as_str().to_string(),
        data: serde_json::to_value(data)?,
    };
    serde_json::to_string(&envelope)
}
