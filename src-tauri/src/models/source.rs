use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Doc,
    Txt,
    Url,
}

impl SourceType {
    /// Infer the type of an uploaded file from its extension. Unknown
    /// extensions are filed as pdf, which is what the service indexes best.
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("doc") | Some("docx") => SourceType::Doc,
            Some("txt") => SourceType::Txt,
            _ => SourceType::Pdf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// `/uploads/<file>` for uploads, the address itself for url sources.
    pub path: String,
}

/// A source as shown in the source list. `selected` only lives in the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    #[serde(flatten)]
    pub source: Source,
    pub selected: bool,
}

impl From<Source> for SourceEntry {
    fn from(source: Source) -> Self {
        Self {
            source,
            selected: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_types_from_extension() {
        assert_eq!(SourceType::from_file_name("notes.PDF"), SourceType::Pdf);
        assert_eq!(SourceType::from_file_name("essay.docx"), SourceType::Doc);
        assert_eq!(SourceType::from_file_name("essay.doc"), SourceType::Doc);
        assert_eq!(SourceType::from_file_name("readme.txt"), SourceType::Txt);
        assert_eq!(SourceType::from_file_name("slides.pptx"), SourceType::Pdf);
        assert_eq!(SourceType::from_file_name("no_extension"), SourceType::Pdf);
    }

    #[test]
    fn entry_flattens_source_and_never_persists_selection() {
        let source = Source {
            id: "s1".into(),
            title: "Lecture 1".into(),
            source_type: SourceType::Pdf,
            path: "/uploads/lecture-1.pdf".into(),
        };
        let stored = serde_json::to_value(&source).unwrap();
        assert_eq!(stored["type"], "pdf");
        assert!(stored.get("selected").is_none());

        let view = serde_json::to_value(SourceEntry::from(source)).unwrap();
        assert_eq!(view["id"], "s1");
        assert_eq!(view["selected"], true);
    }
}
