use serde_json::Value;

use crate::error::ProtocolError;
use crate::events::StreamEvent;

/// Parse one inbound text frame from the streaming channel.
pub fn parse_frame(frame: &str) -> Result<StreamEvent, ProtocolError> {
    let value = serde_json::from_str::<Value>(frame)
        .map_err(|error| ProtocolError::NotJson(error.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    match event_type {
        "suggestions" => {
            let items = match value.get("content") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| item.as_str().map(ToOwned::to_owned))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid(event_type, "content"))?,
                Some(Value::String(item)) => vec![item.clone()],
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(invalid(event_type, "content")),
            };
            Ok(StreamEvent::Suggestions { items })
        }
        "explanation" => Ok(StreamEvent::Explanation {
            content: string_field(&value, event_type, "content")?,
        }),
        "error" => Ok(StreamEvent::Error {
            content: string_field(&value, event_type, "content")?,
        }),
        other => Ok(StreamEvent::Unknown {
            event_type: other.to_owned(),
        }),
    }
}

fn string_field(
    value: &Value,
    event_type: &str,
    field: &'static str,
) -> Result<String, ProtocolError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| invalid(event_type, field))
}

fn invalid(event_type: &str, field: &'static str) -> ProtocolError {
    ProtocolError::InvalidField {
        event_type: event_type.to_owned(),
        field,
    }
}
