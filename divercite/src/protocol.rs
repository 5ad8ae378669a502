use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{FormatError, GridCell, PieceKind};

/// An opaque player identifier chosen by the authority.
///
/// The authority sends ids as numbers in some places and as object keys
/// (i.e. strings) in others, so both are accepted and kept as text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        PlayerId(String::from(id))
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        PlayerId(id)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(n) => PlayerId(n.to_string()),
            Repr::Text(s) => PlayerId(s),
        })
    }
}

/// One game state as the authority serializes it.
///
/// This is the payload of a `play` message, and the element type of a
/// recorded game file. Keys that are not listed here are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    pub rep: RawBoard,
    pub players: Vec<RawPlayer>,
    /// Keyed by player id.
    pub scores: BTreeMap<String, u32>,
    /// Keyed by player id, then by two-letter piece kind code.
    pub players_pieces_left: BTreeMap<String, BTreeMap<String, u8>>,
    pub next_player: RawNextPlayer,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawBoard {
    /// The occupied cells, keyed like `"(4, 6)"`.
    pub env: BTreeMap<String, RawOccupant>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawOccupant {
    pub piece_type: String,
    pub owner_id: PlayerId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPlayer {
    pub name: String,
    /// `"W"` or `"B"`.
    pub piece_type: String,
    pub id: PlayerId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNextPlayer {
    pub name: String,
}

/// Some authority versions encode a payload as a JSON string holding the
/// actual JSON. One level of such wrapping is removed.
pub fn unwrap_payload(payload: Value) -> Result<Value, FormatError> {
    match payload {
        Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        other => Ok(other),
    }
}

/// The one message this viewer sends on its own: place `piece` on `cell`.
///
/// It is never checked for legality here. The authority answers with
/// either a new state or a rejection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub piece: PieceKind,
    #[serde(rename = "position")]
    pub cell: GridCell,
}

/// Everything the transport can report to the core.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    Connected,
    /// A new authoritative state, still in its raw JSON form.
    StateAppended(Value),
    /// The authority refused the last [`MoveIntent`].
    ActionRejected,
    Disconnected,
    /// Final scores, keyed by player id.
    GameOver(Value),
    /// The connection could not be established or broke.
    TransportFailed(String),
}

/// A line of the transport protocol: `{"event": ..., "data": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

pub const EVENT_PLAY: &str = "play";
pub const EVENT_REJECTED: &str = "ActionNotPermitted";
pub const EVENT_DONE: &str = "done";
pub const EVENT_IDENTIFY: &str = "identify";
pub const EVENT_INTERACT: &str = "interact";

impl WireMessage {
    /// The `identify` greeting sent right after connecting.
    pub fn identify(identifier: &str) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(
            String::from("identifier"),
            Value::String(String::from(identifier)),
        );
        Self {
            event: String::from(EVENT_IDENTIFY),
            data: Value::Object(data),
        }
    }

    pub fn interact(intent: MoveIntent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: String::from(EVENT_INTERACT),
            data: serde_json::to_value(intent)?,
        })
    }

    /// Returns `None` for events the viewer does not react to.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        match self.event.as_str() {
            EVENT_PLAY => Some(InboundEvent::StateAppended(self.data)),
            EVENT_REJECTED => Some(InboundEvent::ActionRejected),
            EVENT_DONE => Some(InboundEvent::GameOver(self.data)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::kind;

    #[test]
    fn player_ids_from_numbers_and_strings() {
        let ids: Vec<PlayerId> = serde_json::from_value(json!([1, "2"])).unwrap();
        assert_eq!(ids, vec![PlayerId::from("1"), PlayerId::from("2")]);
        assert!(serde_json::from_value::<PlayerId>(json!(1.5)).is_err());
    }

    #[test]
    fn move_intent_wire_format() {
        let intent = MoveIntent {
            piece: kind!("BC"),
            cell: GridCell { row: 2, col: 3 },
        };
        let msg = WireMessage::interact(intent).unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"event": "interact", "data": {"piece": "BC", "position": [2, 3]}})
        );
    }

    #[test]
    fn inbound_messages() {
        let rejected: WireMessage =
            serde_json::from_str(r#"{"event": "ActionNotPermitted"}"#).unwrap();
        assert_eq!(rejected.into_inbound(), Some(InboundEvent::ActionRejected));

        let done: WireMessage =
            serde_json::from_str(r#"{"event": "done", "data": "{\"1\": 3}"}"#).unwrap();
        assert_eq!(
            done.into_inbound(),
            Some(InboundEvent::GameOver(json!("{\"1\": 3}")))
        );

        let other: WireMessage = serde_json::from_str(r#"{"event": "chat", "data": 1}"#).unwrap();
        assert_eq!(other.into_inbound(), None);
    }

    #[test]
    fn unwraps_one_level_of_string_encoding() {
        assert_eq!(unwrap_payload(json!("{\"a\": 1}")).unwrap(), json!({"a": 1}));
        assert_eq!(unwrap_payload(json!({"a": 1})).unwrap(), json!({"a": 1}));
        // A string inside a string stays a string.
        assert_eq!(
            unwrap_payload(json!("\"{}\"")).unwrap(),
            json!("{}")
        );
        assert!(unwrap_payload(json!("not json")).is_err());
    }
}
