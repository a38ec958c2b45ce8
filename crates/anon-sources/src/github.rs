use std::collections::VecDeque;

use anon_core::{DirectoryNode, Error, FlatEntry, Origin, Result, Snapshot};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::provider::RepositoryProvider;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const ACCEPT_PATCH: &str = "application/vnd.github.patch";

/// GitHub REST implementation of [`RepositoryProvider`].
pub struct GithubProvider {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: Option<u64>,
}

impl GithubProvider {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("anon/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;

        let api_url = Url::parse(api_url)
            .map_err(|e| Error::Other(anyhow::anyhow!("Invalid API URL {}: {}", api_url, e)))?;

        Ok(Self {
            client,
            api_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// `<api_url>/<segments...>`, each segment percent-encoded.
    fn endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Other(anyhow::anyhow!("API URL cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint<'a, I>(&self, origin: &'a Origin, rest: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.endpoint(
            ["repos", origin.owner.as_str(), origin.repo.as_str()]
                .into_iter()
                .chain(rest),
        )
    }

    fn request(&self, method: reqwest::Method, url: Url, accept: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "HTTP error {}: {}",
                status.as_u16(),
                response.url()
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(self.request(reqwest::Method::GET, url, ACCEPT_JSON)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Provider(format!("Invalid response body: {}", e)))
    }

    async fn get_bytes(&self, url: Url, accept: &str) -> Result<Vec<u8>> {
        let response = self.send(self.request(reqwest::Method::GET, url, accept)).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Provider(format!("Failed to read response: {}", e)))
    }

    async fn fetch_tree(&self, origin: &Origin, sha: &str, recursive: bool) -> Result<TreeResponse> {
        let mut url = self.repo_endpoint(origin, ["git", "trees", sha])?;
        if recursive {
            url.query_pairs_mut().append_pair("recursive", "1");
        }
        self.get_json(url).await
    }

    /// Walk the tree one level at a time. Used when GitHub truncates the
    /// recursive listing of large repositories.
    async fn walk_tree(&self, origin: &Origin, root_sha: &str) -> Result<Vec<FlatEntry>> {
        let mut entries = Vec::new();
        let mut pending = VecDeque::from([(root_sha.to_string(), String::new())]);

        while let Some((sha, prefix)) = pending.pop_front() {
            let level = self.fetch_tree(origin, &sha, false).await?;
            for item in level.tree {
                let path = if prefix.is_empty() {
                    item.path.clone()
                } else {
                    format!("{}/{}", prefix, item.path)
                };
                if item.kind == "tree" {
                    pending.push_back((item.sha.clone(), path.clone()));
                }
                if let Some(entry) = flat_entry(&item, path) {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }
}

/// Blobs become files, trees directories; submodule commits are skipped.
fn flat_entry(item: &TreeItem, path: String) -> Option<FlatEntry> {
    match item.kind.as_str() {
        "blob" => Some(FlatEntry::file(path, item.size.unwrap_or(0)).with_sha(&item.sha)),
        "tree" => Some(FlatEntry::directory(path).with_sha(&item.sha)),
        _ => None,
    }
}

fn tree_entries(items: &[TreeItem]) -> Vec<FlatEntry> {
    items
        .iter()
        .filter_map(|item| flat_entry(item, item.path.clone()))
        .collect()
}

#[async_trait]
impl RepositoryProvider for GithubProvider {
    async fn get_commit(&self, origin: &Origin) -> Result<Snapshot> {
        let url = self.repo_endpoint(origin, ["branches", origin.branch.as_str()])?;
        match self.get_json::<BranchResponse>(url).await {
            Ok(branch) => Ok(Snapshot::new(branch.commit.sha)),
            Err(Error::NotFound(_)) => Err(Error::SnapshotUnavailable(format!(
                "Branch {} not found in {}",
                origin.branch,
                origin.full_name()
            ))),
            Err(e) => Err(e),
        }
    }

    async fn get_tree(&self, origin: &Origin, snapshot: &Snapshot) -> Result<DirectoryNode> {
        let response = self.fetch_tree(origin, snapshot.as_str(), true).await?;
        let entries = if response.truncated {
            tracing::warn!(
                repository = %origin.full_name(),
                "recursive tree truncated, walking it level by level"
            );
            self.walk_tree(origin, snapshot.as_str()).await?
        } else {
            tree_entries(&response.tree)
        };
        Ok(DirectoryNode::from_entries(entries))
    }

    async fn get_file_contents(&self, origin: &Origin, path: &str, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let mut url = self.repo_endpoint(
            origin,
            std::iter::once("contents").chain(path.split('/').filter(|s| !s.is_empty())),
        )?;
        url.query_pairs_mut().append_pair("ref", snapshot.as_str());
        self.get_bytes(url, ACCEPT_RAW).await
    }

    async fn get_blob(&self, origin: &Origin, sha: &str) -> Result<Vec<u8>> {
        let url = self.repo_endpoint(origin, ["git", "blobs", sha])?;
        self.get_bytes(url, ACCEPT_RAW).await
    }

    async fn get_patch(&self, origin: &Origin, sha: &str) -> Result<String> {
        let url = self.repo_endpoint(origin, ["commits", sha])?;
        let bytes = self.get_bytes(url, ACCEPT_PATCH).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn render_markdown(&self, origin: &Origin, text: &str) -> Result<String> {
        let url = self.endpoint(["markdown"])?;
        let body = serde_json::json!({
            "text": text,
            "mode": "gfm",
            "context": origin.full_name(),
        });
        let response = self
            .send(self.request(reqwest::Method::POST, url, "text/html").json(&body))
            .await?;
        response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("Failed to read rendered markdown: {}", e)))
    }
}
