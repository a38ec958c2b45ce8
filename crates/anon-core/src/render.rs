//! HTML views for rendered repository content
//!
//! These functions only build markup. Fetching, redaction and caching are
//! done by the engine; everything here is a pure function of its inputs.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};

use crate::{EntryKind, MimeType, TreeEntry};

/// Files larger than this are never fetched or redacted.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;

/// Servable output of a render: bytes plus the declared content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub bytes: Vec<u8>,
    pub content_type: MimeType,
}

impl RenderedPage {
    pub fn new(bytes: Vec<u8>, content_type: MimeType) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn html(markup: String) -> Self {
        Self::new(markup.into_bytes(), MimeType::Html)
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), MimeType::Html)
    }

    /// Lossy text view of the bytes, for logging and tests.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// What a single file renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileView {
    /// Markdown already converted to (redacted) HTML.
    Markdown { html: String },
    /// Reference to an image hosted at its origin. Bytes are never proxied.
    Image { name: String, src: String },
    /// Redacted text shown preformatted.
    Text { content: String },
    /// Commit patch shown preformatted.
    Patch { sha: String, patch: String },
    Oversized {
        name: String,
        size: u64,
        download_url: String,
    },
    Unsupported { name: String },
}

impl FileView {
    pub fn fragment(&self) -> String {
        match self {
            FileView::Markdown { html } => format!("<div class=\"markdown-body\">{}</div>", html),
            FileView::Image { name, src } => format!(
                "<div class=\"image\"><img src=\"{}\" alt=\"{}\"></div>",
                encode_double_quoted_attribute(src),
                encode_double_quoted_attribute(name)
            ),
            FileView::Text { content } => {
                format!("<pre class=\"file\">{}</pre>", encode_text(content))
            }
            FileView::Patch { sha, patch } => format!(
                "<div class=\"commit\"><h2>Commit {}</h2><pre class=\"patch\">{}</pre></div>",
                encode_text(sha),
                encode_text(patch)
            ),
            FileView::Oversized {
                name,
                size,
                download_url,
            } => format!(
                "<div class=\"notice oversized\"><p>The file <strong>{}</strong> is too large to be \
                 anonymized ({}).</p><p><a href=\"{}\">Download {}</a></p></div>",
                encode_text(name),
                human_size(*size),
                encode_double_quoted_attribute(download_url),
                encode_text(name)
            ),
            FileView::Unsupported { name } => format!(
                "<div class=\"notice unsupported\"><p>The file <strong>{}</strong> cannot be \
                 safely anonymized and is not displayed.</p></div>",
                encode_text(name)
            ),
        }
    }
}

/// Location of a page inside an anonymized repository.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub repository_id: &'a str,
    /// Absolute URL prefix of the repository, e.g. `/repository/<id>`.
    pub base_url: &'a str,
    pub path: &'a str,
}

impl PageContext<'_> {
    fn breadcrumb(&self) -> String {
        let mut out = format!("<a href=\"{}/\">root</a>", encode_double_quoted_attribute(self.base_url));
        let mut prefix = String::new();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            prefix.push_str(segment);
            prefix.push('/');
            out.push_str(&format!(
                " / <a href=\"{}/{}\">{}</a>",
                encode_double_quoted_attribute(self.base_url),
                encode_double_quoted_attribute(&prefix),
                encode_text(segment)
            ));
        }
        out
    }
}

fn listing_table(ctx: &PageContext<'_>, entries: &[TreeEntry]) -> String {
    let mut rows = String::new();
    for entry in entries {
        let (href, kind, size) = match entry.kind {
            EntryKind::Directory => (format!("{}/{}/", ctx.base_url, entry.path), "dir", String::new()),
            EntryKind::File => (
                format!("{}/{}", ctx.base_url, entry.path),
                "file",
                entry.size.map(human_size).unwrap_or_default(),
            ),
            EntryKind::Commit => (format!("{}/-/commit/{}", ctx.base_url, entry.path), "commit", String::new()),
        };
        rows.push_str(&format!(
            "<tr class=\"{kind}\"><td><a href=\"{}\">{}</a></td><td>{kind}</td><td>{}</td></tr>\n",
            encode_double_quoted_attribute(&href),
            encode_text(&entry.name),
            size
        ));
    }
    format!(
        "<table class=\"listing\">\n<tr><th>Name</th><th>Type</th><th>Size</th></tr>\n{}</table>",
        rows
    )
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        encode_text(title),
        body
    )
}

/// Browsing page: breadcrumb, optional directory listing, optional body.
pub fn repository_page(ctx: &PageContext<'_>, listing: Option<&[TreeEntry]>, body: Option<&str>) -> String {
    let mut content = format!("<nav class=\"breadcrumb\">{}</nav>\n", ctx.breadcrumb());
    if let Some(entries) = listing {
        content.push_str(&listing_table(ctx, entries));
        content.push('\n');
    }
    if let Some(body) = body {
        content.push_str("<main>");
        content.push_str(body);
        content.push_str("</main>");
    }
    layout(&format!("Anonymous repository {}", ctx.repository_id), &content)
}

pub fn not_found_page(what: &str) -> String {
    layout(
        "Not found",
        &format!(
            "<h1>Not found</h1><p>{} does not exist or is no longer anonymized.</p>",
            encode_text(what)
        ),
    )
}

/// Shown when the remote snapshot cannot be reached.
pub fn unavailable_page(repository_id: &str) -> String {
    layout(
        "Repository temporarily empty",
        &format!(
            "<h1>This repository is temporarily empty</h1><p>The content of {} cannot be \
             retrieved right now. Please try again later.</p>",
            encode_text(repository_id)
        ),
    )
}

pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PageContext<'static> {
        PageContext {
            repository_id: "abc",
            base_url: "/repository/abc",
            path: "src/",
        }
    }

    #[test]
    fn test_text_fragment_is_escaped() {
        let view = FileView::Text {
            content: "<script>alert(1)</script>".to_string(),
        };
        let html = view.fragment();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_oversized_fragment_mentions_name_and_link() {
        let view = FileView::Oversized {
            name: "dump.sql".to_string(),
            size: 2_000_000,
            download_url: "https://example.org/dump.sql".to_string(),
        };
        let html = view.fragment();
        assert!(html.contains("dump.sql"));
        assert!(html.contains("href=\"https://example.org/dump.sql\""));
        assert!(html.contains("2.0 MB"));
    }

    #[test]
    fn test_listing_links_directories_with_trailing_slash() {
        let entries = vec![
            TreeEntry {
                name: "lib".to_string(),
                path: "src/lib".to_string(),
                kind: EntryKind::Directory,
                size: None,
            },
            TreeEntry {
                name: "main.rs".to_string(),
                path: "src/main.rs".to_string(),
                kind: EntryKind::File,
                size: Some(1200),
            },
        ];
        let page = repository_page(&ctx(), Some(&entries), None);
        assert!(page.contains("href=\"/repository/abc/src/lib/\""));
        assert!(page.contains("href=\"/repository/abc/src/main.rs\""));
        assert!(page.contains("1.2 KB"));
        assert!(page.contains("<a href=\"/repository/abc/src/\">src</a>"));
    }

    #[test]
    fn test_not_found_and_unavailable_differ() {
        assert_ne!(not_found_page("abc"), unavailable_page("abc"));
        assert!(unavailable_page("abc").contains("temporarily empty"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(999), "999 B");
        assert_eq!(human_size(1_500), "1.5 KB");
        assert_eq!(human_size(2_000_000), "2.0 MB");
    }
}
