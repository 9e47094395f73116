//! Wire frame codec
//!
//! Every message on the socket is a text frame holding a tagged JSON
//! envelope: `{"op": <code>, "d": <payload object>}`. This module owns the
//! envelope, the operation codes and the typed payloads for the messages
//! the client sends or inspects. Field names on the wire are camelCase.

use crate::traits::{ObsLinkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation code tag of a wire frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OpCode {
    /// Server announces protocol capabilities (first inbound frame)
    Hello,
    /// Client identifies itself and subscribes to event categories
    Identify,
    /// Server confirms identification; handshake complete
    Identified,
    /// Unsolicited event notification
    Event,
    /// Client-issued request
    Request,
    /// Response correlated to an earlier request by id
    RequestResponse,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        match op {
            OpCode::Hello => 0,
            OpCode::Identify => 1,
            OpCode::Identified => 2,
            OpCode::Event => 5,
            OpCode::Request => 6,
            OpCode::RequestResponse => 7,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(OpCode::Hello),
            1 => Ok(OpCode::Identify),
            2 => Ok(OpCode::Identified),
            5 => Ok(OpCode::Event),
            6 => Ok(OpCode::Request),
            7 => Ok(OpCode::RequestResponse),
            other => Err(format!("unknown operation code: {}", other)),
        }
    }
}

/// A single wire message: operation code plus payload object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub op: OpCode,
    #[serde(default)]
    pub d: Value,
}

impl Frame {
    pub fn new(op: OpCode, d: Value) -> Self {
        Self { op, d }
    }

    /// Encode the frame into a text payload for the transport
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ObsLinkError::Codec(e.to_string()))
    }

    /// Decode a text frame received from the transport
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ObsLinkError::Codec(e.to_string()))
    }

    /// Deserialize the payload into a typed struct
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.d.clone()).map_err(|e| ObsLinkError::Codec(e.to_string()))
    }

    /// Build an Identify frame from a typed payload
    pub fn identify(identify: &Identify) -> Result<Self> {
        let d = serde_json::to_value(identify).map_err(|e| ObsLinkError::Codec(e.to_string()))?;
        Ok(Self::new(OpCode::Identify, d))
    }

    /// Build a Request frame from a typed payload
    pub fn request(request: &RequestPayload) -> Result<Self> {
        let d = serde_json::to_value(request).map_err(|e| ObsLinkError::Codec(e.to_string()))?;
        Ok(Self::new(OpCode::Request, d))
    }
}

/// Identify payload (op 1, outbound)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    pub event_subscriptions: u32,
}

/// Event payload (op 5, inbound)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// Request payload (op 6, outbound)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub request_type: String,
    pub request_id: String,
    #[serde(default)]
    pub request_data: Value,
}

/// Status block of a request response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Request response payload (op 7, inbound)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponsePayload {
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

/// Event subscription bitmask values for the Identify frame
///
/// Categories combine with `|`. `DEFAULT` is the mask the client requests
/// out of the box: general state plus filter events, enough traffic for the
/// readiness heuristic to observe a live remote.
pub mod event_subscription {
    pub const NONE: u32 = 0;
    pub const GENERAL: u32 = 1 << 0;
    pub const CONFIG: u32 = 1 << 1;
    pub const SCENES: u32 = 1 << 2;
    pub const INPUTS: u32 = 1 << 3;
    pub const TRANSITIONS: u32 = 1 << 4;
    pub const FILTERS: u32 = 1 << 5;
    pub const OUTPUTS: u32 = 1 << 6;
    pub const SCENE_ITEMS: u32 = 1 << 7;
    pub const MEDIA_INPUTS: u32 = 1 << 8;
    pub const VENDORS: u32 = 1 << 9;
    pub const UI: u32 = 1 << 10;

    pub const ALL: u32 = GENERAL
        | CONFIG
        | SCENES
        | INPUTS
        | TRANSITIONS
        | FILTERS
        | OUTPUTS
        | SCENE_ITEMS
        | MEDIA_INPUTS
        | VENDORS
        | UI;

    pub const DEFAULT: u32 = GENERAL | FILTERS;
}
