//! Wire types for the chat proxy endpoint.

use serde::{Deserialize, Serialize};

use crate::store::ApiConfig;

/// One conversation turn as sent by the chat UI: a role plus typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// Concatenated text parts of this message.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::File { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Typed message content: plain text or a file/image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    File {
        url: String,
        #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

/// Request body for `POST /api/chat`.
///
/// Fields default so validation can produce 400s with useful messages
/// instead of deserialization rejections.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatProxyRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub xml: String,
    pub api_config: Option<ApiConfig>,
}

/// Events the proxy republishes to the client, one JSON object per SSE
/// `data:` frame, terminated by a literal `[DONE]` frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    TextDelta {
        delta: String,
    },
    /// Complete text payload from the divergent SiliconFlow path; `tool`
    /// tags the payload when it carries diagram XML for `display_diagram`.
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
    },
    ToolCallStart {
        call_id: String,
        name: String,
    },
    ToolCallDelta {
        call_id: String,
        delta: String,
    },
    ToolCallEnd {
        call_id: String,
    },
    Error {
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_part_tags() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "parts": [
                {"type": "text", "text": "draw a vpc"},
                {"type": "file", "url": "data:image/png;base64,AAAA", "mediaType": "image/png"}
            ]
        }))
        .unwrap();

        assert_eq!(msg.parts.len(), 2);
        assert_eq!(msg.text(), "draw a vpc");
    }

    #[test]
    fn test_chat_event_serialization() {
        let ev = ChatEvent::Text {
            text: "<root/>".into(),
            tool: Some("display_diagram".into()),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["tool"], "display_diagram");

        let ev = ChatEvent::TextDelta { delta: "hi".into() };
        assert_eq!(serde_json::to_value(&ev).unwrap()["type"], "text_delta");
    }

    #[test]
    fn test_proxy_request_tolerates_missing_fields() {
        let req: ChatProxyRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.messages.is_empty());
        assert!(req.api_config.is_none());
        assert!(req.xml.is_empty());
    }
}
