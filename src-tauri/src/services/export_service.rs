use std::fs;
use std::path::Path;
use pulldown_cmark::{html, Options, Parser};
use crate::error::{AppError, AppResult};
use crate::models::{DocumentStatus, GeneratedDocument};

const DOCUMENT_CSS: &str = r#"
body { font-family: Georgia, serif; max-width: 46rem; margin: 3rem auto; padding: 0 1.5rem; line-height: 1.6; color: #1f2328; }
header { border-bottom: 1px solid #d0d7de; margin-bottom: 2rem; }
header .kind { text-transform: uppercase; letter-spacing: 0.08em; font-size: 0.75rem; color: #57606a; }
pre { background: #f6f8fa; padding: 1rem; overflow-x: auto; border-radius: 6px; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d0d7de; padding: 0.35rem 0.75rem; }
blockquote { border-left: 4px solid #d0d7de; margin-left: 0; padding-left: 1rem; color: #57606a; }
"#;

/// Markdown body of a generated document rendered to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone HTML page for a document.
pub fn render_html(document: &GeneratedDocument) -> String {
    let title = html_escape(&document.title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <header>
        <p class="kind">{kind}</p>
        <h1>{title}</h1>
    </header>
    <main>
{body}
    </main>
</body>
</html>
"#,
        title = title,
        css = DOCUMENT_CSS,
        kind = document.doc_type.tag().replace('_', " "),
        body = markdown_to_html(&document.content),
    )
}

/// Write a ready document to `path`: HTML for `.html`/`.htm`, Markdown otherwise.
pub fn export_document(document: &GeneratedDocument, path: &Path) -> AppResult<()> {
    if document.status != DocumentStatus::Ready {
        return Err(AppError::Invalid(format!(
            "{} is not ready to export ({:?})",
            document.title, document.status
        )));
    }

    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false);

    let content = if is_html {
        render_html(document)
    } else {
        document.content.clone()
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn ready(content: &str) -> GeneratedDocument {
        let mut doc = GeneratedDocument::pending(DocumentType::Faq);
        doc.content = content.to_string();
        doc.status = DocumentStatus::Ready;
        doc
    }

    #[test]
    fn renders_markdown() {
        let html = markdown_to_html("# FAQ\n\n**Q:** what?\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>FAQ</h1>"));
        assert!(html.contains("<strong>Q:</strong>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn page_escapes_title() {
        let mut doc = ready("body");
        doc.title = "<script>".into();
        let page = render_html(&doc);
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<h1><script>"));
    }

    #[test]
    fn export_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ready("# FAQ\n\nQ: why?");

        let md = dir.path().join("faq.md");
        export_document(&doc, &md).unwrap();
        assert_eq!(fs::read_to_string(&md).unwrap(), "# FAQ\n\nQ: why?");

        let page = dir.path().join("out/faq.html");
        export_document(&doc, &page).unwrap();
        assert!(fs::read_to_string(&page).unwrap().starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn unfinished_documents_are_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let doc = GeneratedDocument::pending(DocumentType::Timeline);
        assert!(matches!(
            export_document(&doc, &dir.path().join("t.md")),
            Err(AppError::Invalid(_))
        ));
    }
}
