use serde_json::Value;

/// `messages.upsert` and `MESSAGES_UPSERT` normalise to the same kind.
pub fn normalise_event_kind(raw: &str) -> String {
    raw.replace('.', "_").to_ascii_uppercase()
}

pub struct ExtractedFields {
    pub chat_id: Option<String>,
    pub sender_id: Option<String>,
    pub summary: String,
}

/// Per-kind `{chat_id, sender_id, summary}` extraction for the event log.
/// Message-bearing kinds get a summary built from the extracted text (first
/// 120 chars, `[sent]`-prefixed when self-sent); everything else gets an
/// empty summary.
pub fn extract_fields(event_kind: &str, data: &Value) -> ExtractedFields {
    if event_kind == "MESSAGES_UPSERT" {
        let chat_id = data["key"]["remoteJid"].as_str().map(|s| s.to_string());
        let sender_id = data["key"]["participant"]
            .as_str()
            .filter(|s| !s.is_empty())
            .or(chat_id.as_deref())
            .map(|s| s.to_string());
        let from_me = data["key"]["fromMe"].as_bool().unwrap_or(false);

        let summary = match extract_message_text(data) {
            Some(text) => {
                let truncated: String = text.chars().take(120).collect();
                if from_me {
                    format!("[sent] {truncated}")
                } else {
                    truncated
                }
            }
            None => String::new(),
        };

        return ExtractedFields { chat_id, sender_id, summary };
    }

    let chat_id = data["chatId"]
        .as_str()
        .or_else(|| data["remoteJid"].as_str())
        .map(|s| s.to_string());
    let sender_id = data["senderId"].as_str().map(|s| s.to_string());

    ExtractedFields {
        chat_id,
        sender_id,
        summary: String::new(),
    }
}

/// First present of `conversation`, `extendedTextMessage.text`,
/// `imageMessage.caption`, `videoMessage.caption`.
pub fn extract_message_text(data: &Value) -> Option<String> {
    let message = &data["message"];

    message["conversation"]
        .as_str()
        .or_else(|| message["extendedTextMessage"]["text"].as_str())
        .or_else(|| message["imageMessage"]["caption"].as_str())
        .or_else(|| message["videoMessage"]["caption"].as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalises_dotted_lowercase_kinds() {
        assert_eq!(normalise_event_kind("messages.upsert"), "MESSAGES_UPSERT");
        assert_eq!(normalise_event_kind("MESSAGES_UPSERT"), "MESSAGES_UPSERT");
        assert_eq!(normalise_event_kind("connection.update"), "CONNECTION_UPDATE");
    }

    #[test]
    fn extracts_conversation_text() {
        let data = json!({ "message": { "conversation": "hello there" } });
        assert_eq!(extract_message_text(&data), Some("hello there".to_string()));
    }

    #[test]
    fn falls_back_to_extended_text() {
        let data = json!({ "message": { "extendedTextMessage": { "text": "quoted reply" } } });
        assert_eq!(extract_message_text(&data), Some("quoted reply".to_string()));
    }

    #[test]
    fn falls_back_to_captions() {
        let data = json!({ "message": { "imageMessage": { "caption": "a photo" } } });
        assert_eq!(extract_message_text(&data), Some("a photo".to_string()));
    }

    #[test]
    fn summary_prefixed_when_self_sent() {
        let data = json!({
            "key": { "remoteJid": "123@g.us", "fromMe": true },
            "message": { "conversation": "hi" }
        });
        let fields = extract_fields("MESSAGES_UPSERT", &data);
        assert_eq!(fields.summary, "[sent] hi");
    }
}
