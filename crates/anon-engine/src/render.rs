//! Render engine: resolved node to servable bytes

use std::sync::Arc;

use anon_core::classify::{
    DEFAULT_BINARY_THRESHOLD, classify, is_image, is_markdown_like, is_text_extension, is_website_path,
    looks_like_text,
};
use anon_core::render::{DEFAULT_MAX_FILE_SIZE, repository_page};
use anon_core::{
    Error, FileNode, FileView, PageContext, Registration, RenderedPage, Result, Snapshot, TreeEntry, TreeNode,
};
use anon_security::Redactor;
use anon_sources::RepositoryProvider;

use crate::resolver::Resolution;

#[derive(Debug, Clone, Copy)]
pub struct RenderLimits {
    /// Files above this size are never fetched.
    pub max_file_size: u64,
    /// Fraction of non-text bytes above which unknown files are binary.
    pub binary_threshold: f64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            binary_threshold: DEFAULT_BINARY_THRESHOLD,
        }
    }
}

/// Everything a render needs besides the node itself.
pub struct RenderContext<'a> {
    pub registration: &'a Registration,
    pub snapshot: &'a Snapshot,
    pub redactor: &'a Redactor,
    /// Request path relative to the repository root.
    pub path: &'a str,
    /// URL prefix of the repository pages, e.g. `/repository/<id>`.
    pub base_url: &'a str,
}

impl RenderContext<'_> {
    fn website_mode(&self) -> bool {
        is_website_path(self.path)
    }

    fn page_context(&self) -> PageContext<'_> {
        PageContext {
            repository_id: &self.registration.id,
            base_url: self.base_url,
            path: self.path,
        }
    }
}

/// A file renders either to a view wrapped in the browsing page, or, in
/// website mode, to its own bytes.
enum Body {
    View(FileView),
    Raw(RenderedPage),
}

pub struct RenderEngine {
    provider: Arc<dyn RepositoryProvider>,
    limits: RenderLimits,
}

impl RenderEngine {
    pub fn new(provider: Arc<dyn RepositoryProvider>, limits: RenderLimits) -> Self {
        Self { provider, limits }
    }

    pub fn limits(&self) -> RenderLimits {
        self.limits
    }

    /// Render a resolution. Fails only with [`Error::SnapshotUnavailable`]
    /// when file contents cannot be fetched.
    pub async fn render(&self, ctx: &RenderContext<'_>, resolution: &Resolution) -> Result<RenderedPage> {
        match (&resolution.node, &resolution.effective) {
            (TreeNode::Commit(commit), _) => {
                let patch = self.redact(ctx, &commit.patch);
                let view = FileView::Patch {
                    sha: commit.sha.clone(),
                    patch,
                };
                Ok(self.wrap(ctx, None, view))
            }
            (TreeNode::Directory(_), None) => {
                if ctx.website_mode() {
                    Ok(RenderedPage::empty())
                } else {
                    let page = repository_page(&ctx.page_context(), Some(&resolution.listing), None);
                    Ok(RenderedPage::html(page))
                }
            }
            (TreeNode::Directory(_), Some(file)) | (TreeNode::File(_), Some(file)) => {
                match self.render_file(ctx, file).await? {
                    Body::Raw(page) => Ok(page),
                    Body::View(view) => Ok(self.wrap(ctx, Some(&resolution.listing), view)),
                }
            }
            (TreeNode::File(file), None) => Err(Error::NotFound(file.path.clone())),
        }
    }

    fn wrap(&self, ctx: &RenderContext<'_>, listing: Option<&[TreeEntry]>, view: FileView) -> RenderedPage {
        let listing = if ctx.website_mode() { None } else { listing };
        let page = repository_page(&ctx.page_context(), listing, Some(&view.fragment()));
        RenderedPage::html(page)
    }

    fn redact(&self, ctx: &RenderContext<'_>, content: &str) -> String {
        let (redacted, report) = ctx.redactor.redact_with_report(content);
        if !report.is_empty() {
            tracing::debug!(
                repository_id = %ctx.registration.id,
                path = ctx.path,
                ?report,
                "redacted content"
            );
        }
        redacted
    }

    async fn fetch(&self, ctx: &RenderContext<'_>, file: &FileNode) -> Result<Vec<u8>> {
        self.provider
            .get_file_contents(&ctx.registration.origin, &file.path, ctx.snapshot)
            .await
            .map_err(|e| {
                tracing::warn!(path = %file.path, error = %e, "failed to fetch file contents");
                Error::SnapshotUnavailable(e.to_string())
            })
    }

    async fn render_file(&self, ctx: &RenderContext<'_>, file: &FileNode) -> Result<Body> {
        let origin = &ctx.registration.origin;
        let website = ctx.website_mode();

        if file.size > self.limits.max_file_size {
            return Ok(Body::View(FileView::Oversized {
                name: file.name.clone(),
                size: file.size,
                download_url: origin.raw_url(ctx.snapshot.as_str(), &file.path),
            }));
        }

        if is_markdown_like(&file.name) {
            let bytes = self.fetch(ctx, file).await?;
            let source = String::from_utf8_lossy(&bytes);
            let html = self
                .provider
                .render_markdown(origin, &source)
                .await
                .map_err(|e| Error::SnapshotUnavailable(e.to_string()))?;
            let html = self.redact(ctx, &html);
            return Ok(if website {
                Body::Raw(RenderedPage::html(html))
            } else {
                Body::View(FileView::Markdown { html })
            });
        }

        if is_image(&file.name) {
            return Ok(Body::View(FileView::Image {
                name: file.name.clone(),
                src: origin.raw_url(ctx.snapshot.as_str(), &file.path),
            }));
        }

        let bytes = self.fetch(ctx, file).await?;
        if !is_text_extension(&file.name) && !looks_like_text(&bytes, self.limits.binary_threshold) {
            return Ok(Body::View(FileView::Unsupported {
                name: file.name.clone(),
            }));
        }

        let content = self.redact(ctx, &String::from_utf8_lossy(&bytes));
        Ok(if website {
            Body::Raw(RenderedPage::new(content.into_bytes(), classify(&file.name, true)))
        } else {
            Body::View(FileView::Text { content })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Resolved, resolve_in_tree};
    use anon_core::{MimeType, Origin};
    use anon_sources::MemoryProvider;

    struct Fixture {
        provider: Arc<MemoryProvider>,
        engine: RenderEngine,
        registration: Registration,
        redactor: Redactor,
        snapshot: Snapshot,
    }

    fn fixture(files: Vec<(&str, Vec<u8>)>) -> Fixture {
        let origin = Origin::new("alice", "project", "main");
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_repository(&origin, "c1", files);
        let registration = Registration::with_id("r1", origin, vec!["alice".to_string()]);
        let redactor = Redactor::for_registration(&registration, "https://anon.example").unwrap();
        Fixture {
            engine: RenderEngine::new(provider.clone(), RenderLimits::default()),
            provider,
            registration,
            redactor,
            snapshot: Snapshot::new("c1"),
        }
    }

    impl Fixture {
        async fn render(&self, path: &str) -> RenderedPage {
            let tree = self
                .provider
                .get_tree(&self.registration.origin, &self.snapshot)
                .await
                .unwrap();
            let Resolved::Found(resolution) = resolve_in_tree(&tree, path) else {
                panic!("{} should resolve", path);
            };
            let ctx = RenderContext {
                registration: &self.registration,
                snapshot: &self.snapshot,
                redactor: &self.redactor,
                path,
                base_url: "/repository/r1",
            };
            self.engine.render(&ctx, &resolution).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_text_file_is_redacted_and_escaped() {
        let f = fixture(vec![("notes.txt", b"Alice <b>wrote</b> this".to_vec())]);
        let page = f.render("notes.txt").await;
        assert_eq!(page.content_type, MimeType::Html);
        let html = page.text();
        assert!(html.contains("XXX &lt;b&gt;wrote&lt;/b&gt; this"));
        assert!(!html.to_lowercase().contains("alice"));
    }

    #[tokio::test]
    async fn test_markdown_goes_through_provider() {
        let f = fixture(vec![("README.md", b"Made by Alice".to_vec())]);
        let page = f.render("README.md").await;
        assert!(page.text().contains("<div class=\"markdown-body\"><p>Made by XXX</p></div>"));
        assert_eq!(f.provider.markdown_calls(), 1);
    }

    #[tokio::test]
    async fn test_image_is_referenced_not_fetched() {
        let f = fixture(vec![("logo.png", vec![0x89, b'P', b'N', b'G'])]);
        let page = f.render("logo.png").await;
        assert!(page.text().contains("<img src=\"https://raw.githubusercontent.com/"));
        assert_eq!(f.provider.fetches_of("logo.png"), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_is_not_fetched() {
        let f = fixture(vec![("big.json", vec![b'a'; 2_000_000])]);
        let page = f.render("big.json").await;
        assert_eq!(page.content_type, MimeType::Html);
        assert!(page.text().contains("big.json"));
        assert!(page.text().contains("too large"));
        assert_eq!(f.provider.fetches_of("big.json"), 0);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_sniffed() {
        let f = fixture(vec![
            ("data.bin", vec![0u8, 1, 2, 3, 0xff, 0xfe, 7, 8]),
            ("notes.unknown", b"plain words from alice".to_vec()),
        ]);
        assert!(f.render("data.bin").await.text().contains("cannot be safely anonymized"));
        assert!(f.render("notes.unknown").await.text().contains("plain words from XXX"));
    }

    #[tokio::test]
    async fn test_website_mode_serves_raw_bytes() {
        let f = fixture(vec![
            ("docs/app.js", b"const author = 'alice';".to_vec()),
            ("docs/site/style.css", b"body {}".to_vec()),
            ("docs/site/other.css", b"p {}".to_vec()),
        ]);
        let page = f.render("docs/app.js").await;
        assert_eq!(page.content_type, MimeType::Javascript);
        assert_eq!(page.text(), "const author = 'XXX';");

        let page = f.render("docs/site/").await;
        assert!(page.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_directory_listing_with_readme() {
        let f = fixture(vec![
            ("src/README.md", b"About the code".to_vec()),
            ("src/main.rs", b"fn main() {}".to_vec()),
        ]);
        let html = f.render("src/").await.text();
        assert!(html.contains("href=\"/repository/r1/src/main.rs\""));
        assert!(html.contains("<p>About the code</p>"));
    }

    #[tokio::test]
    async fn test_commit_patch_is_redacted() {
        let f = fixture(vec![("a.txt", b"a".to_vec())]);
        let resolution = crate::resolver::Resolution {
            node: TreeNode::Commit(anon_core::CommitNode {
                sha: "abc123".to_string(),
                patch: "From: Alice <alice@example.org>".to_string(),
            }),
            effective: None,
            listing: Vec::new(),
            needs_trailing_slash: false,
        };
        let ctx = RenderContext {
            registration: &f.registration,
            snapshot: &f.snapshot,
            redactor: &f.redactor,
            path: "-/commit/abc123",
            base_url: "/repository/r1",
        };
        let html = f.engine.render(&ctx, &resolution).await.unwrap().text();
        assert!(html.contains("Commit abc123"));
        assert!(html.contains("From: XXX &lt;XXX@example.org&gt;"));
    }
}
