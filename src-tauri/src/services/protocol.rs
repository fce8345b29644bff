//! Wire messages exchanged with the assistant service.
//!
//! Every frame is UTF-8 text. Outbound frames are always JSON objects;
//! inbound frames are JSON when the service remembers to, raw text otherwise.

use crate::models::DocumentType;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Binds the stream to a class. Sent once, right after open.
    Bind { class_id: String },
    Chat { message: String },
    GenerateDocument {
        document_type: DocumentType,
        format: String,
        class_id: String,
    },
    /// Second frame on the `add_source/` stream, after `Bind`.
    IndexSource { file_path: String },
}

impl Outbound {
    pub fn encode(&self) -> String {
        let value = match self {
            Outbound::Bind { class_id } => json!({ "data": class_id }),
            Outbound::Chat { message } => json!({ "message": message }),
            Outbound::GenerateDocument { document_type, format, class_id } => json!({
                "type": "generate_document",
                "document_type": document_type.tag(),
                "format": format,
                "classId": class_id,
            }),
            Outbound::IndexSource { file_path } => json!({ "file_path": file_path }),
        };
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    ChatReply {
        response: String,
        questions: Vec<String>,
    },
    Document {
        doc_type: DocumentType,
        content: String,
    },
    /// `{"error": ...}`, sent when the service fails internally.
    Error { error: String },
    /// Anything that is not one of the shapes above, verbatim.
    Raw(String),
}

#[derive(Deserialize)]
struct DocumentWire {
    #[serde(rename = "type")]
    doc_type: DocumentType,
    content: String,
}

#[derive(Deserialize)]
struct ChatReplyWire {
    response: String,
    #[serde(default)]
    questions: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ErrorWire {
    error: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InboundWire {
    Document(DocumentWire),
    ChatReply(ChatReplyWire),
    Error(ErrorWire),
    Text(String),
}

impl Inbound {
    /// Decode a frame. Never fails: unknown shapes come back as `Raw`.
    pub fn decode(frame: &str) -> Inbound {
        let wire = match serde_json::from_str::<InboundWire>(frame) {
            Ok(wire) => wire,
            Err(_) => return Inbound::Raw(frame.to_string()),
        };

        match wire {
            InboundWire::Document(doc) if !doc.content.is_empty() => Inbound::Document {
                doc_type: doc.doc_type,
                content: doc.content,
            },
            InboundWire::Document(_) => Inbound::Raw(frame.to_string()),
            InboundWire::ChatReply(reply) => Inbound::ChatReply {
                response: reply.response,
                questions: reply.questions.unwrap_or_default(),
            },
            InboundWire::Error(err) => Inbound::Error { error: err.error },
            InboundWire::Text(text) => Inbound::Raw(text),
        }
    }

    /// Encode as the service would send it. `Raw` is sent as-is.
    pub fn encode(&self) -> String {
        match self {
            Inbound::ChatReply { response, questions } => {
                json!({ "response": response, "questions": questions }).to_string()
            }
            Inbound::Document { doc_type, content } => {
                json!({ "type": doc_type.tag(), "content": content }).to_string()
            }
            Inbound::Error { error } => json!({ "error": error }).to_string(),
            Inbound::Raw(text) => text.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::ChatReply { .. } => "chat_reply",
            Inbound::Document { .. } => "document",
            Inbound::Error { .. } => "error",
            Inbound::Raw(_) => "raw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn outbound_shapes() {
        let bind = parse(&Outbound::Bind { class_id: "c1".into() }.encode());
        assert_eq!(bind, json!({ "data": "c1" }));

        let chat = parse(&Outbound::Chat { message: "hello".into() }.encode());
        assert_eq!(chat, json!({ "message": "hello" }));

        let generate = parse(
            &Outbound::GenerateDocument {
                document_type: DocumentType::StudyGuide,
                format: String::new(),
                class_id: "c1".into(),
            }
            .encode(),
        );
        assert_eq!(
            generate,
            json!({
                "type": "generate_document",
                "document_type": "study_guide",
                "format": "",
                "classId": "c1",
            })
        );

        let index = parse(&Outbound::IndexSource { file_path: "/uploads/a.pdf".into() }.encode());
        assert_eq!(index, json!({ "file_path": "/uploads/a.pdf" }));
    }

    #[test]
    fn decodes_chat_reply() {
        let inbound = Inbound::decode(r#"{"response":"hi there","questions":["What topic?"]}"#);
        assert_eq!(
            inbound,
            Inbound::ChatReply {
                response: "hi there".into(),
                questions: vec!["What topic?".into()],
            }
        );
    }

    #[test]
    fn chat_reply_without_questions() {
        let inbound = Inbound::decode(r#"{"response":"ok"}"#);
        assert_eq!(
            inbound,
            Inbound::ChatReply { response: "ok".into(), questions: vec![] }
        );
        let inbound = Inbound::decode(r#"{"response":"ok","questions":null}"#);
        assert!(matches!(inbound, Inbound::ChatReply { questions, .. } if questions.is_empty()));
    }

    #[test]
    fn decodes_document() {
        let inbound = Inbound::decode(r#"{"type":"timeline","content":"1066: Hastings"}"#);
        assert_eq!(
            inbound,
            Inbound::Document {
                doc_type: DocumentType::Timeline,
                content: "1066: Hastings".into(),
            }
        );
    }

    #[test]
    fn document_round_trip() {
        let original = Inbound::Document {
            doc_type: DocumentType::Faq,
            content: "# FAQ\n\nQ: why?\nA: because.".into(),
        };
        assert_eq!(Inbound::decode(&original.encode()), original);
    }

    #[test]
    fn incomplete_documents_fall_back_to_raw() {
        for frame in [
            r#"{"type":"faq"}"#,
            r#"{"type":"faq","content":""}"#,
            r#"{"type":"essay","content":"text"}"#,
            r#"{"type":"faq","content":42}"#,
        ] {
            assert_eq!(Inbound::decode(frame), Inbound::Raw(frame.to_string()), "{frame}");
        }
    }

    #[test]
    fn non_json_is_raw() {
        let frame = "# FAQ\n1. What is a stream?";
        assert_eq!(Inbound::decode(frame), Inbound::Raw(frame.to_string()));
        assert_eq!(Inbound::decode(""), Inbound::Raw(String::new()));
    }

    #[test]
    fn json_string_is_unwrapped() {
        assert_eq!(Inbound::decode(r#""plain answer""#), Inbound::Raw("plain answer".into()));
    }

    #[test]
    fn decodes_service_error() {
        let inbound = Inbound::decode(r#"{"error":"An error occurred: boom"}"#);
        assert_eq!(inbound, Inbound::Error { error: "An error occurred: boom".into() });
    }
}
