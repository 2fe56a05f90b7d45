//! Message wire types shared by the client, the store and the reference service.

use serde::{Deserialize, Serialize};

/// Server-assigned message identifier.
pub type MessageId = i64;

/// A single conversation entry: the user's text and the bot's reply to it.
///
/// `id`, `bot_response` and `timestamp` are always taken verbatim from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub user_message: String,
    pub bot_response: String,
    /// Creation/update time as sent by the service; opaque to the client.
    pub timestamp: String,
}

/// Request body for create (POST) and update (PUT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub user_message: String,
}

impl MessageDraft {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
        }
    }
}

/// True if `text` has at least one non-whitespace character.
pub fn has_content(text: &str) -> bool {
    !text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_snake_case_wire_names() {
        let json = r#"{"id":1,"user_message":"hi","bot_response":"hello","timestamp":"t1"}"#;
        let m: Message = serde_json::from_str(json).unwrap();
        assert_eq!(m.id, 1);
        assert_eq!(m.user_message, "hi");
        assert_eq!(m.bot_response, "hello");
        assert_eq!(m.timestamp, "t1");
    }

    #[test]
    fn draft_serializes_only_user_message() {
        let v = serde_json::to_value(MessageDraft::new("how are you")).unwrap();
        assert_eq!(v, serde_json::json!({ "user_message": "how are you" }));
    }

    #[test]
    fn whitespace_only_text_has_no_content() {
        assert!(!has_content(""));
        assert!(!has_content("   "));
        assert!(!has_content("\n\t "));
        assert!(has_content(" hey "));
    }
}
