//! Classification of Slack event request bodies
//!
//! A body is either a URL verification challenge, a typed event callback, or
//! something this receiver cannot route.

use crate::error::ReceiverError;
use serde_json::Value;

/// Parsed request body
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// URL verification handshake. `challenge` is echoed back verbatim.
    Challenge { challenge: String, body: Value },
    /// Event callback routed by `event.type`
    Event { event_type: String, body: Value },
}

impl Envelope {
    /// Full parsed envelope, handed to handlers as is
    pub fn body(&self) -> &Value {
        match self {
            Envelope::Challenge { body, .. } | Envelope::Event { body, .. } => body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Envelope::Challenge { body, .. } | Envelope::Event { body, .. } => body,
        }
    }
}

/// Decodes and classifies a raw request body.
///
/// # Errors
/// * `InvalidJson` if the bytes are not valid UTF-8 JSON
/// * `MissingEvent` if the body has neither `challenge` nor `event.type`
pub fn parse(raw: &[u8]) -> Result<Envelope, ReceiverError> {
    let body: Value =
        serde_json::from_slice(raw).map_err(|e| ReceiverError::InvalidJson(e.to_string()))?;

    classify(body)
}

/// Classifies an already decoded body. `challenge` wins over `event`.
///
/// A string challenge is echoed as is, `null` as an empty body, anything else
/// as its JSON text.
pub fn classify(body: Value) -> Result<Envelope, ReceiverError> {
    if let Some(challenge) = body.get("challenge") {
        let challenge = match challenge {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        return Ok(Envelope::Challenge { challenge, body });
    }

    let event_type = body
        .get("event")
        .and_then(|event| event.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ReceiverError::MissingEvent)?;

    Ok(Envelope::Event { event_type, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_challenge() {
        let raw = br#"{"token":"Jhj5dZrVaK7ZwHHjRyZWjbDl","challenge":"abc123","type":"url_verification"}"#;

        let envelope = parse(raw).unwrap();

        assert!(matches!(
            &envelope,
            Envelope::Challenge { challenge, .. } if challenge == "abc123"
        ));
        assert_eq!(envelope.body()["type"], "url_verification");
    }

    #[test]
    fn test_parse_event() {
        let raw = br#"{"event":{"type":"reaction_added","reaction":"tada"}}"#;

        let envelope = parse(raw).unwrap();

        assert_eq!(
            envelope,
            Envelope::Event {
                event_type: "reaction_added".into(),
                body: json!({"event": {"type": "reaction_added", "reaction": "tada"}}),
            }
        );
    }

    #[test]
    fn test_challenge_takes_precedence_over_event() {
        let body = json!({"challenge": "c", "event": {"type": "message"}});

        assert!(matches!(
            classify(body),
            Ok(Envelope::Challenge { .. })
        ));
    }

    #[test]
    fn test_non_string_challenge_is_rendered_as_json() {
        let envelope = classify(json!({"challenge": 42})).unwrap();

        assert!(matches!(
            envelope,
            Envelope::Challenge { challenge, .. } if challenge == "42"
        ));
    }

    #[test]
    fn test_null_challenge_is_empty() {
        let envelope = classify(json!({"challenge": null, "type": "url_verification"})).unwrap();

        assert!(matches!(
            envelope,
            Envelope::Challenge { challenge, .. } if challenge.is_empty()
        ));
    }

    #[test]
    fn test_missing_event() {
        assert_eq!(
            classify(json!({"token": "x"})),
            Err(ReceiverError::MissingEvent)
        );
        assert_eq!(classify(json!({"event": {}})), Err(ReceiverError::MissingEvent));
        assert_eq!(
            classify(json!({"event": {"type": 7}})),
            Err(ReceiverError::MissingEvent)
        );
        assert_eq!(classify(json!([1, 2, 3])), Err(ReceiverError::MissingEvent));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse(b"{not json"), Err(ReceiverError::InvalidJson(_))));
        assert!(matches!(parse(b""), Err(ReceiverError::InvalidJson(_))));
        assert!(matches!(
            parse(&[0xff, 0xfe, 0x00]),
            Err(ReceiverError::InvalidJson(_))
        ));
    }
}
