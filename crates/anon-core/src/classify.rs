//! Content classification: MIME types and file kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path prefix under which files are served as a static site.
pub const WEBSITE_PREFIX: &str = "docs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    PlainText,
    #[serde(rename = "text/css")]
    Css,
    #[serde(rename = "application/xml")]
    Xml,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "application/javascript")]
    Javascript,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Html => "text/html",
            MimeType::PlainText => "text/plain",
            MimeType::Css => "text/css",
            MimeType::Xml => "application/xml",
            MimeType::Json => "application/json",
            MimeType::Javascript => "application/javascript",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
            MimeType::Gif => "image/gif",
        }
    }

    /// Value for a `Content-Type` header.
    pub fn header_value(&self) -> String {
        match self {
            MimeType::Jpeg | MimeType::Png | MimeType::Gif => self.as_str().to_string(),
            _ => format!("{}; charset=utf-8", self.as_str()),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim();
        let mime = match essence {
            "text/html" => MimeType::Html,
            "text/plain" => MimeType::PlainText,
            "text/css" => MimeType::Css,
            "application/xml" => MimeType::Xml,
            "application/json" => MimeType::Json,
            "application/javascript" => MimeType::Javascript,
            "image/jpeg" => MimeType::Jpeg,
            "image/png" => MimeType::Png,
            "image/gif" => MimeType::Gif,
            _ => return None,
        };
        Some(mime)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const WEBSITE_TEXT_EXTENSIONS: &[&str] = &["txt", "log", "csv", "xml", "json", "java", "py", "lua", "js"];

/// Extensions rendered as text without sniffing their content.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "csv", "tsv", "xml", "json", "java", "py", "lua", "js", "html", "htm", "css",
    "ts", "tsx", "jsx", "rs", "c", "h", "cc", "cpp", "hpp", "cs", "go", "rb", "php", "pl", "sh",
    "bash", "zsh", "bat", "ps1", "kt", "kts", "scala", "swift", "m", "r", "jl", "hs", "ml", "ex",
    "exs", "erl", "clj", "lisp", "el", "vim", "sql", "yml", "yaml", "toml", "ini", "cfg", "conf",
    "properties", "gradle", "sbt", "cmake", "mk", "tex", "bib", "rst", "adoc", "org", "svg",
    "ipynb", "sol", "gp", "out", "license", "dockerfile", "gitignore", "gitattributes",
    "editorconfig", "lock", "diff", "patch", "proto", "graphql", "vue", "svelte", "dart", "zig",
    "nix",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Lowercased text after the last dot, if any.
pub fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Names with at least one letter and no lowercase letters (`LICENSE`,
/// `CONTRIBUTING`). Such files are treated as readme-like documents.
pub fn is_fully_uppercase(file_name: &str) -> bool {
    file_name.chars().any(char::is_alphabetic) && !file_name.chars().any(char::is_lowercase)
}

pub fn is_markdown_like(file_name: &str) -> bool {
    extension(file_name).as_deref() == Some("md")
        || is_fully_uppercase(file_name)
        || file_name.eq_ignore_ascii_case("changelog")
}

pub fn is_image(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_text_extension(file_name: &str) -> bool {
    let name = file_name.to_ascii_lowercase();
    // Extension-less well-known names (`Makefile`, `Dockerfile`).
    if matches!(name.as_str(), "makefile" | "dockerfile" | "license" | "gemfile" | "rakefile") {
        return true;
    }
    extension(file_name).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a browse path is served in website mode.
pub fn is_website_path(path: &str) -> bool {
    path.trim_start_matches('/').starts_with(WEBSITE_PREFIX)
}

/// Map a file name to the content type it is served with.
///
/// Outside website mode every page is wrapped in the browsing chrome and is
/// therefore HTML. In website mode the rules below are checked in order and
/// the first match wins.
pub fn classify(file_name: &str, website_mode: bool) -> MimeType {
    if !website_mode {
        return MimeType::Html;
    }

    let ext = extension(file_name);
    let ext = ext.as_deref();

    if ext == Some("html") {
        return MimeType::Html;
    }
    if ext == Some("md") {
        return MimeType::Html;
    }
    if is_fully_uppercase(file_name) {
        return MimeType::Html;
    }
    match ext {
        Some("jpg") | Some("jpeg") => return MimeType::Jpeg,
        Some("png") => return MimeType::Png,
        Some("gif") => return MimeType::Gif,
        _ => {}
    }
    if let Some(ext) = ext
        && WEBSITE_TEXT_EXTENSIONS.contains(&ext)
    {
        return match ext {
            "xml" => MimeType::Xml,
            "json" => MimeType::Json,
            "js" => MimeType::Javascript,
            _ => MimeType::PlainText,
        };
    }
    if ext == Some("css") {
        return MimeType::Css;
    }
    MimeType::PlainText
}

/// Fraction of non-text bytes above which content is treated as binary.
pub const DEFAULT_BINARY_THRESHOLD: f64 = 0.30;

/// Number of leading bytes inspected by [`looks_like_text`].
const SNIFF_LEN: usize = 8192;

fn is_text_byte(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x20..=0x7e)
}

/// Sample the start of `content` and report whether it reads as text.
///
/// Bytes outside printable ASCII and common whitespace count against the
/// sample; above `threshold` the content is binary. Empty content is text.
/// Multi-byte UTF-8 sequences count as text when they decode.
pub fn looks_like_text(content: &[u8], threshold: f64) -> bool {
    let sample = &content[..content.len().min(SNIFF_LEN)];
    if sample.is_empty() {
        return true;
    }

    let valid_utf8 = match std::str::from_utf8(sample) {
        Ok(s) => s,
        // A cut in the middle of a multi-byte char at the sample boundary.
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => "",
    };

    let odd = if valid_utf8.is_empty() {
        sample.iter().filter(|b| !is_text_byte(**b)).count()
    } else {
        valid_utf8
            .chars()
            .filter(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{c}'))
            .count()
    };

    (odd as f64) / (sample.len() as f64) <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_website_is_always_html() {
        assert_eq!(classify("anything.bin", false), MimeType::Html);
        assert_eq!(classify("script.js", false), MimeType::Html);
        assert_eq!(classify("photo.png", false), MimeType::Html);
    }

    #[test]
    fn test_website_classification() {
        assert_eq!(classify("readme.md", true), MimeType::Html);
        assert_eq!(classify("index.html", true), MimeType::Html);
        assert_eq!(classify("script.js", true), MimeType::Javascript);
        assert_eq!(classify("data.json", true), MimeType::Json);
        assert_eq!(classify("feed.xml", true), MimeType::Xml);
        assert_eq!(classify("notes.txt", true), MimeType::PlainText);
        assert_eq!(classify("Main.java", true), MimeType::PlainText);
        assert_eq!(classify("style.css", true), MimeType::Css);
        assert_eq!(classify("photo.GIF", true), MimeType::Gif);
        assert_eq!(classify("photo.jpg", true), MimeType::Jpeg);
        assert_eq!(classify("logo.png", true), MimeType::Png);
        assert_eq!(classify("archive.tar.gz", true), MimeType::PlainText);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        assert_eq!(classify("a.json.md", true), MimeType::Html);
        // Fully uppercase is checked before images.
        assert_eq!(classify("LOGO.PNG", true), MimeType::Html);
        assert_eq!(classify("LICENSE", true), MimeType::Html);
    }

    #[test]
    fn test_markdown_like() {
        assert!(is_markdown_like("README.md"));
        assert!(is_markdown_like("LICENSE"));
        assert!(is_markdown_like("ChangeLog"));
        assert!(!is_markdown_like("main.rs"));
        assert!(!is_markdown_like("Makefile"));
        assert!(!is_fully_uppercase("123"));
    }

    #[test]
    fn test_text_extensions() {
        assert!(is_text_extension("lib.rs"));
        assert!(is_text_extension("Makefile"));
        assert!(is_text_extension("notebook.IPYNB"));
        assert!(!is_text_extension("blob.bin"));
        assert!(!is_text_extension("noext"));
    }

    #[test]
    fn test_website_path() {
        assert!(is_website_path("docs/index.html"));
        assert!(is_website_path("docs/"));
        assert!(!is_website_path("docs"));
        assert!(!is_website_path("src/docs/a.md"));
    }

    #[test]
    fn test_looks_like_text() {
        assert!(looks_like_text(b"", DEFAULT_BINARY_THRESHOLD));
        assert!(looks_like_text(b"plain ascii\nwith lines\t", DEFAULT_BINARY_THRESHOLD));
        assert!(looks_like_text("h\u{e9}llo w\u{f6}rld".as_bytes(), DEFAULT_BINARY_THRESHOLD));
        assert!(!looks_like_text(&[0x89, b'P', b'N', b'G', 0x00, 0x01], DEFAULT_BINARY_THRESHOLD));

        let mostly_binary: Vec<u8> = (0..100).map(|i| if i % 2 == 0 { 0x80 } else { 0xff }).collect();
        assert!(!looks_like_text(&mostly_binary, DEFAULT_BINARY_THRESHOLD));

        // Latin-1 text with a few high bytes stays under the threshold.
        let mut latin1 = b"caf".to_vec();
        latin1.push(0xe9);
        latin1.extend_from_slice(b" au lait, sans sucre");
        assert!(looks_like_text(&latin1, DEFAULT_BINARY_THRESHOLD));
    }
}
