use serde_json::{Map, Value};

use super::message::{ChatError, Message, MessageKind, PLACEHOLDER_TEXT};

/// Text fields, in order of preference.
const TEXT_FIELDS: [&str; 2] = ["content", "message"];

/// Validate and coerce a raw inbound payload into a transcript message.
///
/// The `type` discriminant is mandatory; content is not. A payload without any
/// usable text field still normalizes, with [`PLACEHOLDER_TEXT`] as its text.
pub fn normalize(raw: &str) -> Result<Message, ChatError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ChatError::InvalidMessage(format!("malformed payload: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| ChatError::InvalidMessage("payload is not a JSON object".to_string()))?;

    let discriminant = object
        .get("type")
        .filter(|value| is_truthy(value))
        .and_then(coerce_text)
        .ok_or_else(|| ChatError::InvalidMessage("missing type".to_string()))?;

    Ok(Message {
        kind: MessageKind::from_discriminant(&discriminant),
        text: extract_text(object).unwrap_or_else(|| PLACEHOLDER_TEXT.to_string()),
        attached_article: None,
    })
}

fn extract_text(object: &Map<String, Value>) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(coerce_text)
}

/// `false` and zero carry no discriminant, same as null and "".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        _ => true,
    }
}

/// String form of a JSON value; null and empty strings count as absent.
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_response_with_content() {
        let msg = normalize(r#"{"type":"bot_response","content":"hi there"}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Bot);
        assert_eq!(msg.text, "hi there");
        assert!(msg.attached_article.is_none());
    }

    #[test]
    fn falls_back_to_message_field() {
        let msg = normalize(r#"{"type":"message","author":"assistant","message":"from message"}"#)
            .unwrap();
        assert_eq!(msg.text, "from message");
    }

    #[test]
    fn content_wins_over_message() {
        let msg = normalize(r#"{"type":"bot_response","content":"a","message":"b"}"#).unwrap();
        assert_eq!(msg.text, "a");
    }

    #[test]
    fn empty_content_falls_through() {
        let msg = normalize(r#"{"type":"bot_response","content":"","message":"b"}"#).unwrap();
        assert_eq!(msg.text, "b");
    }

    #[test]
    fn non_string_content_is_coerced() {
        let msg = normalize(r#"{"type":"bot_response","content":42}"#).unwrap();
        assert_eq!(msg.text, "42");

        let msg = normalize(r#"{"type":"bot_response","content":true}"#).unwrap();
        assert_eq!(msg.text, "true");
    }

    #[test]
    fn missing_text_uses_placeholder() {
        let msg = normalize(r#"{"type":"bot_response"}"#).unwrap();
        assert_eq!(msg.text, PLACEHOLDER_TEXT);

        let msg = normalize(r#"{"type":"bot_response","content":null,"message":null}"#).unwrap();
        assert_eq!(msg.text, PLACEHOLDER_TEXT);
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = normalize(r#"{"content":"hi"}"#).unwrap_err();
        assert!(matches!(err, ChatError::InvalidMessage(_)));

        assert!(normalize(r#"{"type":null,"content":"hi"}"#).is_err());
        assert!(normalize(r#"{"type":"","content":"hi"}"#).is_err());
    }

    #[test]
    fn falsy_type_is_rejected() {
        assert!(normalize(r#"{"type":false,"content":"hi"}"#).is_err());
        assert!(normalize(r#"{"type":0,"content":"hi"}"#).is_err());
        assert!(normalize(r#"{"type":0.0,"content":"hi"}"#).is_err());

        let msg = normalize(r#"{"type":true,"content":"hi"}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Bot);
        assert!(normalize(r#"{"type":7,"content":"hi"}"#).is_ok());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(normalize("not json"), Err(ChatError::InvalidMessage(_))));
        assert!(matches!(normalize("[1,2,3]"), Err(ChatError::InvalidMessage(_))));
        assert!(matches!(normalize(r#""just a string""#), Err(ChatError::InvalidMessage(_))));
    }

    #[test]
    fn rejection_depends_only_on_discriminant() {
        let with_type = [
            r#"{"type":"x"}"#,
            r#"{"type":"x","content":"c"}"#,
            r#"{"type":"x","message":"m"}"#,
            r#"{"type":"x","content":"c","message":"m"}"#,
        ];
        let without_type = [
            r#"{}"#,
            r#"{"content":"c"}"#,
            r#"{"message":"m"}"#,
            r#"{"content":"c","message":"m"}"#,
        ];

        for raw in with_type {
            assert!(normalize(raw).is_ok(), "expected ok for {}", raw);
        }
        for raw in without_type {
            assert!(normalize(raw).is_err(), "expected rejection for {}", raw);
        }
    }

    #[test]
    fn error_discriminant_keeps_kind() {
        let msg = normalize(r#"{"type":"error","message":"backend exploded"}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.text, "backend exploded");
    }
}
