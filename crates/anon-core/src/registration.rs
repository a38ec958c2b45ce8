//! Registration domain model

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result, Snapshot};

const DEFAULT_HOST: &str = "github.com";
const DEFAULT_BRANCH: &str = "main";

/// Remote repository a registration republishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default = "default_host")]
    pub host: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Origin {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Parse `https://github.com/owner/repo`, `github.com/owner/repo` or
    /// `owner/repo`. A `/tree/<branch>` suffix selects the branch.
    pub fn parse(input: &str, branch: Option<&str>) -> Result<Self> {
        let trimmed = input.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);

        let segments: Vec<&str> = without_scheme
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let (host, rest) = match segments.first() {
            Some(first) if first.contains('.') => (first.to_string(), &segments[1..]),
            _ => (default_host(), &segments[..]),
        };

        let (owner, repo) = match rest {
            [owner, repo, ..] => (owner.to_string(), repo.trim_end_matches(".git").to_string()),
            _ => {
                return Err(Error::InvalidOrigin(format!(
                    "Expected owner/repo in {}",
                    input
                )));
            }
        };

        let branch = match (branch, rest) {
            (Some(b), _) => b.to_string(),
            (None, [_, _, "tree", b, ..]) => b.to_string(),
            _ => default_branch(),
        };

        Ok(Self {
            host,
            owner,
            repo,
            branch,
        })
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Browsable URL of the repository on its host.
    pub fn url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.repo)
    }

    /// Direct download URL of a file at the given ref.
    pub fn raw_url(&self, reference: &str, path: &str) -> String {
        if self.host == DEFAULT_HOST {
            format!(
                "https://raw.githubusercontent.com/{}/{}/{}/{}",
                self.owner, self.repo, reference, path
            )
        } else {
            format!("{}/raw/{}/{}", self.url(), reference, path)
        }
    }
}

/// Per-registration redaction switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionOptions {
    /// Keep links. When false every URL is masked.
    #[serde(default = "default_true")]
    pub link: bool,

    /// Keep markdown images. When false they are stripped.
    #[serde(default = "default_true")]
    pub image: bool,

    /// Mask a whole URL when it contains a term.
    #[serde(default = "default_true")]
    pub whole_url: bool,

    /// Only match terms on word boundaries.
    #[serde(default = "default_true")]
    pub word_boundary: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RedactionOptions {
    fn default() -> Self {
        Self {
            link: true,
            image: true,
            whole_url: true,
            word_boundary: true,
        }
    }
}

/// Mapping from an anonymized id to an origin repository and its blacklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub origin: Origin,
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub options: RedactionOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot: Option<Snapshot>,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl Registration {
    pub fn new(origin: Origin, terms: Vec<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), origin, terms)
    }

    pub fn with_id(id: impl Into<String>, origin: Origin, terms: Vec<String>) -> Self {
        Self {
            id: id.into(),
            origin,
            terms,
            options: RedactionOptions::default(),
            last_snapshot: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_options(mut self, options: RedactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the cached content of this registration matches `live`.
    pub fn is_current(&self, live: &Snapshot) -> bool {
        self.last_snapshot.as_ref() == Some(live)
    }
}
