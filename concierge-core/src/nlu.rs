use async_trait::async_trait;
use concierge_shared::Direction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CollaboratorResult, CoreError, CoreResult};

/// What the NLU collaborator is being asked to extract this turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "direction", rename_all = "snake_case")]
pub enum NluTask {
    ProductSelection,
    FlightLeg(Direction),
    Contact,
}

/// One extraction request: instructions, the raw user text and whatever
/// has been collected so far.
#[derive(Debug, Clone, Serialize)]
pub struct NluRequest {
    pub task: NluTask,
    pub instructions: String,
    pub user_text: String,
    pub state: Value,
}

/// Structured answer parsed out of the collaborator's raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NluReply {
    pub message: String,
    pub done: bool,
    pub fields: Map<String, Value>,
}

impl NluReply {
    /// First non-blank string under any of `keys`. Numbers are stringified.
    pub fn field_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.fields.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First non-negative integer under any of `keys`, accepting numeric strings.
    pub fn field_u32(&self, keys: &[&str]) -> Option<u32> {
        keys.iter().find_map(|key| match self.fields.get(*key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Language-understanding collaborator. Returns the raw completion text;
/// parsing is done with [`parse_nlu_reply`] so malformed output never
/// becomes a transport error.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn complete(&self, request: &NluRequest) -> CollaboratorResult<String>;
}

/// Keys that wrap extracted fields in the reply shapes we have seen.
const FIELD_CONTAINERS: [&str; 4] = ["fields", "collected", "flight_info", "contact"];

/// Pulls a JSON object out of a completion: plain JSON, a ```json fenced
/// block, or the outermost `{ ... }` span.
pub fn parse_nlu_reply(raw: &str) -> CoreResult<NluReply> {
    let candidate = if let Some(rest) = raw.split("```json").nth(1) {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            &raw[start..=end]
        } else {
            raw
        }
    } else {
        raw
    };

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| CoreError::MalformedReply(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(CoreError::MalformedReply("reply is not a JSON object".to_string()));
    };

    let message = match object.remove("message") {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let done = match object.remove("done") {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    let mut fields = Map::new();
    for container in FIELD_CONTAINERS {
        if let Some(Value::Object(inner)) = object.remove(container) {
            fields.extend(inner);
        }
    }
    // Anything left at the top level is treated as a field too.
    for (key, value) in object {
        if !value.is_null() {
            fields.entry(key).or_insert(value);
        }
    }

    Ok(NluReply {
        message,
        done,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let reply = parse_nlu_reply(
            r#"{"message": "Great choice", "done": true, "fields": {"product_type": "ARRIVALONLY"}}"#,
        )
        .unwrap();
        assert_eq!(reply.message, "Great choice");
        assert!(reply.done);
        assert_eq!(reply.field_str(&["product_type"]).as_deref(), Some("ARRIVALONLY"));
    }

    #[test]
    fn test_parse_fenced_block_with_chatter() {
        let raw = "Sure! Here you go:\n```json\n{\"message\": \"Which date?\", \"done\": false, \"flight_info\": {\"airport_id\": \"SIA\", \"adult_tickets\": \"2\"}}\n```\nAnything else?";
        let reply = parse_nlu_reply(raw).unwrap();
        assert_eq!(reply.message, "Which date?");
        assert!(!reply.done);
        assert_eq!(reply.field_str(&["origin_airport_id", "airport_id"]).as_deref(), Some("SIA"));
        assert_eq!(reply.field_u32(&["adult_tickets"]), Some(2));
    }

    #[test]
    fn test_parse_embedded_braces() {
        let raw = "ok {\"message\": \"hi\", \"contact\": {\"email\": \"a@b.co\"}} trailing";
        let reply = parse_nlu_reply(raw).unwrap();
        assert_eq!(reply.field_str(&["email"]).as_deref(), Some("a@b.co"));
    }

    #[test]
    fn test_malformed_reply_is_an_error() {
        assert!(parse_nlu_reply("I could not understand that, sorry").is_err());
        assert!(parse_nlu_reply("[1, 2, 3]").is_err());
        assert!(parse_nlu_reply("{ not json }").is_err());
    }

    #[test]
    fn test_blank_and_null_fields_are_ignored() {
        let reply = parse_nlu_reply(r#"{"message": "", "fields": {"flight_id": "  "}, "extra": null}"#).unwrap();
        assert_eq!(reply.field_str(&["flight_id"]), None);
        assert!(!reply.fields.contains_key("extra"));
    }

    #[test]
    fn test_task_serialization() {
        let task = NluTask::FlightLeg(Direction::Arrival);
        assert_eq!(
            serde_json::to_value(task).unwrap(),
            json!({"kind": "flight_leg", "direction": "ARRIVAL"})
        );
    }
}
