use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::run::{Group, RunLabel, RunType};

/// Free-form event fields, flattened into the event object on the wire.
pub type EventPayload = Map<String, Value>;

/// Builds a payload from a `json!` object literal. Anything that is not an
/// object yields an empty payload.
pub fn payload(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}

/// One entry of a capture session's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Milliseconds since the session started; never decreases.
    #[serde(rename = "t_ms")]
    pub relative_ms: u64,
    /// Server-aligned epoch milliseconds, `None` when clock sync failed.
    #[serde(rename = "abs_ms")]
    pub absolute_ms: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TimelineEvent {
    pub fn new(
        relative_ms: u64,
        absolute_ms: Option<i64>,
        kind: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            relative_ms,
            absolute_ms,
            kind: kind.into(),
            payload,
        }
    }
}

/// Metadata a session is begun with. Drives the upload filename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    /// 1-based set number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_label: Option<RunLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_type: Option<RunType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Overrides the generated filename timestamp so several capture kinds
    /// of one set can share it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(flatten)]
    pub extra: EventPayload,
}

impl SessionMeta {
    pub fn for_set(participant: impl Into<String>, set: u32, run_label: RunLabel) -> Self {
        Self {
            participant: Some(participant.into()),
            set: Some(set),
            run_label: Some(run_label),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_payload_is_flattened() {
        let event = TimelineEvent::new(
            1200,
            None,
            "que",
            payload(json!({ "text": "何時でしたか", "trialIndex": 1 })),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "t_ms": 1200,
                "abs_ms": null,
                "type": "que",
                "text": "何時でしたか",
                "trialIndex": 1,
            })
        );

        let back: TimelineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn meta_uses_wire_names_and_skips_missing_fields() {
        let meta = SessionMeta::for_set("alice", 2, RunLabel::B);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            json!({ "participant": "alice", "set": 2, "runLabel": "B" })
        );
    }

    #[test]
    fn non_object_payload_is_empty() {
        assert!(payload(json!([1, 2, 3])).is_empty());
    }
}
