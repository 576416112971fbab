//! Context assembly for the chat proxy.
//!
//! The model needs the current canvas state alongside the user's request, so
//! the last turn is rewritten: a synthetic text block carrying the diagram
//! XML and the user's literal text, followed by any image parts the turn
//! already had. Prior turns pass through unmodified.

use crate::chat::{ChatMessage, MessagePart};

/// Pure transform: returns a new message list with the last turn's content
/// replaced by the augmented block. Does not mutate its input.
pub fn augment(messages: &[ChatMessage], diagram_xml: &str) -> Vec<ChatMessage> {
    let Some((last, prior)) = messages.split_last() else {
        return Vec::new();
    };

    let user_text = last.text();
    let file_parts: Vec<MessagePart> = last
        .parts
        .iter()
        .filter(|p| matches!(p, MessagePart::File { .. }))
        .cloned()
        .collect();

    let mut parts = Vec::with_capacity(1 + file_parts.len());
    parts.push(MessagePart::Text {
        text: context_block(diagram_xml, &user_text),
    });
    parts.extend(file_parts);

    let mut augmented: Vec<ChatMessage> = prior.to_vec();
    augmented.push(ChatMessage {
        role: last.role.clone(),
        parts,
    });
    augmented
}

/// Both the XML and the user text go in verbatim, fenced so the model can
/// tell canvas state apart from instructions.
fn context_block(diagram_xml: &str, user_text: &str) -> String {
    format!(
        "Current diagram XML:\n```xml\n{diagram_xml}\n```\n\nUser request:\n```\n{user_text}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_turn_rewritten() {
        let messages = vec![
            ChatMessage::user_text("hello"),
            ChatMessage {
                role: "assistant".into(),
                parts: vec![MessagePart::Text {
                    text: "done".into(),
                }],
            },
            ChatMessage::user_text("add a database"),
        ];

        let augmented = augment(&messages, "<root><mxCell id=\"0\"/></root>");

        assert_eq!(augmented.len(), 3);
        // Prior turns untouched
        assert_eq!(augmented[0].text(), "hello");
        assert_eq!(augmented[1].text(), "done");
        // Last turn carries both fenced blocks verbatim
        let text = augmented[2].text();
        assert!(text.contains("```xml\n<root><mxCell id=\"0\"/></root>\n```"));
        assert!(text.contains("```\nadd a database\n```"));
        assert_eq!(augmented[2].role, "user");
    }

    #[test]
    fn test_image_parts_preserved_after_text_block() {
        let messages = vec![ChatMessage {
            role: "user".into(),
            parts: vec![
                MessagePart::Text {
                    text: "replicate this sketch".into(),
                },
                MessagePart::File {
                    url: "data:image/png;base64,QUJD".into(),
                    media_type: Some("image/png".into()),
                },
            ],
        }];

        let augmented = augment(&messages, "");
        assert_eq!(augmented[0].parts.len(), 2);
        assert!(matches!(augmented[0].parts[0], MessagePart::Text { .. }));
        assert!(matches!(augmented[0].parts[1], MessagePart::File { .. }));
    }

    #[test]
    fn test_empty_xml_still_fenced() {
        let augmented = augment(&[ChatMessage::user_text("start")], "");
        assert!(augmented[0].text().contains("```xml\n\n```"));
    }

    #[test]
    fn test_input_not_mutated() {
        let messages = vec![ChatMessage::user_text("original")];
        let _ = augment(&messages, "<root/>");
        assert_eq!(messages[0].text(), "original");
    }

    #[test]
    fn test_empty_message_list() {
        assert!(augment(&[], "<root/>").is_empty());
    }
}
