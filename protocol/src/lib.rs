//! The wire format shared between the session engine and the interactive service.
//!
//! This crate only describes *shapes*: JSON-RPC frames, method name constants, and
//! the DTOs carried in their `params`/`result` fields. It holds no behavior; the
//! session engine in `session-core` is the only consumer, and it owns every piece
//! of logic that interprets these shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Outbound method names (client -> service).
// ============================================================================

pub const METHOD_GET_TIME: &str = "getTime";
pub const METHOD_GET_GROUPS: &str = "getGroups";
pub const METHOD_GET_SCENES: &str = "getScenes";
pub const METHOD_CREATE_GROUPS: &str = "createGroups";
pub const METHOD_UPDATE_GROUPS: &str = "updateGroups";
pub const METHOD_UPDATE_PARTICIPANTS: &str = "updateParticipants";
pub const METHOD_UPDATE_CONTROLS: &str = "updateControls";
pub const METHOD_READY: &str = "ready";
pub const METHOD_CAPTURE: &str = "capture";

// ============================================================================
// Inbound method names (service -> client).
// ============================================================================

pub const METHOD_ON_PARTICIPANT_JOIN: &str = "onParticipantJoin";
pub const METHOD_ON_PARTICIPANT_LEAVE: &str = "onParticipantLeave";
pub const METHOD_ON_PARTICIPANT_UPDATE: &str = "onParticipantUpdate";
pub const METHOD_ON_READY: &str = "onReady";
pub const METHOD_ON_GROUP_CREATE: &str = "onGroupCreate";
pub const METHOD_ON_GROUP_UPDATE: &str = "onGroupUpdate";
pub const METHOD_ON_CONTROL_UPDATE: &str = "onControlUpdate";
pub const METHOD_GIVE_INPUT: &str = "giveInput";

/// The bootstrap endpoint that resolves to a websocket address.
pub const BOOTSTRAP_URL: &str = "https://beam.pro/api/v1/interactive/hosts";

/// Protocol version advertised during the websocket handshake.
pub const PROTOCOL_VERSION: &str = "2.0";

// ============================================================================
// JSON-RPC envelope.
// ============================================================================

/// A parsed frame received from (or about to be sent to) the service.
///
/// `type` discriminates between an outbound/inbound method call and a reply to
/// a previously sent method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "method")]
    Method {
        id: u32,
        method: String,
        #[serde(default)]
        params: Value,
        #[serde(default)]
        discard: bool,
    },
    #[serde(rename = "reply")]
    Reply {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RpcError>,
    },
}

impl Frame {
    /// The `id` field, present on every frame regardless of variant.
    pub fn id(&self) -> u32 {
        match self {
            Frame::Method { id, .. } => *id,
            Frame::Reply { id, .. } => *id,
        }
    }
}

/// The error object carried by a reply frame that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// Entity DTOs as they appear on the wire.
// ============================================================================

/// A scene as returned by `getScenes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneWire {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(default)]
    pub controls: Vec<ControlWire>,
}

/// A group as returned by `getGroups`, `onGroupCreate`/`onGroupUpdate`, or echoed
/// back by `createGroups`/`updateGroups`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWire {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(default)]
    pub etag: String,
}

/// A control as the service sends it. `kind` discriminates button vs joystick;
/// fields only meaningful to one kind are left `None` by the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlWire {
    #[serde(rename = "controlID")]
    pub control_id: String,
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, rename = "cost")]
    pub cost: Option<u32>,
    #[serde(default, rename = "cooldown")]
    pub cooldown: Option<i64>,
    #[serde(default, rename = "progress")]
    pub progress: Option<f32>,
    #[serde(default, rename = "x")]
    pub x: Option<f64>,
    #[serde(default, rename = "y")]
    pub y: Option<f64>,
}

pub const CONTROL_KIND_BUTTON: &str = "button";
pub const CONTROL_KIND_JOYSTICK: &str = "joystick";

/// A participant as it appears in `onParticipantJoin`/`onParticipantUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantWire {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "userID")]
    pub mixer_id: u32,
    pub username: String,
    #[serde(default)]
    pub level: u32,
    #[serde(rename = "groupID", default = "default_group_id")]
    pub group_id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "connectedAt", default)]
    pub connected_at: i64,
    #[serde(rename = "lastInputAt", default)]
    pub last_input_at: i64,
    #[serde(default)]
    pub etag: String,
}

pub fn default_group_id() -> String {
    "default".to_string()
}

/// The `input` payload nested inside `giveInput`'s params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiveInputParams {
    #[serde(rename = "participantID")]
    pub participant_id: String,
    pub input: InputWire,
    #[serde(rename = "transactionID", default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputWire {
    #[serde(rename = "controlID")]
    pub control_id: String,
    pub event: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

pub const INPUT_EVENT_MOUSE_DOWN: &str = "mousedown";
pub const INPUT_EVENT_KEY_DOWN: &str = "keydown";
pub const INPUT_EVENT_MOUSE_UP: &str = "mouseup";
pub const INPUT_EVENT_KEY_UP: &str = "keyup";
pub const INPUT_EVENT_MOVE: &str = "move";

// ============================================================================
// Outbound param shapes.
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ReadyParams {
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureParams {
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupsParams {
    pub groups: Vec<GroupWire>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateParticipantsParams {
    pub participants: Vec<ParticipantPatch>,
}

/// The subset of a participant a client is allowed to write back.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantPatch {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "groupID", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub etag: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateControlsParams {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    pub controls: Vec<ControlPatch>,
}

/// The subset of a control a client is allowed to write back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlPatch {
    #[serde(rename = "controlID")]
    pub control_id: String,
    #[serde(default)]
    pub etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_frame_round_trips() {
        let frame = Frame::Method {
            id: 7,
            method: METHOD_READY.to_string(),
            params: serde_json::json!({ "isReady": true }),
            discard: false,
        };
        let text = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&text).unwrap();
        match back {
            Frame::Method { id, method, params, discard } => {
                assert_eq!(id, 7);
                assert_eq!(method, METHOD_READY);
                assert_eq!(params, serde_json::json!({ "isReady": true }));
                assert!(!discard);
            }
            Frame::Reply { .. } => panic!("expected method frame"),
        }
    }

    #[test]
    fn reply_frame_with_error_round_trips() {
        let frame = Frame::Reply {
            id: 3,
            result: None,
            error: Some(RpcError {
                code: 500,
                message: "boom".to_string(),
                path: None,
            }),
        };
        let text = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&text).unwrap();
        assert_eq!(back.id(), 3);
        match back {
            Frame::Reply { error: Some(e), .. } => assert_eq!(e.code, 500),
            _ => panic!("expected reply with error"),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let text = r#"{"type":"notification","id":1}"#;
        let result: Result<Frame, _> = serde_json::from_str(text);
        assert!(result.is_err());
    }
}
