use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Exam,
    StudyGuide,
    Briefing,
    Faq,
    Timeline,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Exam,
        DocumentType::StudyGuide,
        DocumentType::Briefing,
        DocumentType::Faq,
        DocumentType::Timeline,
    ];

    /// Wire tag, as used in `document_type` and inbound `type`.
    pub fn tag(self) -> &'static str {
        match self {
            DocumentType::Exam => "exam",
            DocumentType::StudyGuide => "study_guide",
            DocumentType::Briefing => "briefing",
            DocumentType::Faq => "faq",
            DocumentType::Timeline => "timeline",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn title(self) -> &'static str {
        match self {
            DocumentType::Exam => "Practice Exam",
            DocumentType::StudyGuide => "Study Guide",
            DocumentType::Briefing => "Briefing Doc",
            DocumentType::Faq => "FAQ",
            DocumentType::Timeline => "Timeline",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Generating,
    Ready,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
    pub requested_at: DateTime<Utc>,
}

impl GeneratedDocument {
    /// Empty placeholder created when a generation request goes out.
    pub fn pending(doc_type: DocumentType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            doc_type,
            title: doc_type.title().to_string(),
            content: String::new(),
            status: DocumentStatus::Generating,
            requested_at: Utc::now(),
        }
    }
}
