use anon_core::{Origin, RedactionOptions, Registration};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Replacement for every redacted term or URL.
pub const MASK: &str = "XXX";

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(
        r"<?\b((https?|ftp|file)://)[-A-Za-z0-9+&@#/%?=~_|!:,.;]+[-A-Za-z0-9+&@#/%=~_|]\b/?>?"
    )
    .expect("url pattern is valid");
    static ref MARKDOWN_IMAGE_PATTERN: Regex =
        Regex::new(r#"!\[[^\]]*\]\([^)"]*(?:"[^"]*")?\)"#).expect("image pattern is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionInfo {
    pub redaction_type: String,
    pub count: usize,
}

/// Term redaction engine for one registration.
///
/// Steps run in a fixed order: optional image and link stripping, rewriting
/// of links back to the origin repository, then each blacklist term in list
/// order (whole URLs first, bare words second).
pub struct Redactor {
    self_links: Vec<Regex>,
    anonymized_base: String,
    terms: Vec<Regex>,
    options: RedactionOptions,
}

impl Redactor {
    pub fn new(
        origin: &Origin,
        terms: &[String],
        options: RedactionOptions,
        anonymized_base: String,
    ) -> Result<Self, regex::Error> {
        let self_links = self_link_patterns(origin)
            .into_iter()
            .map(|p| Regex::new(&p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut compiled = Vec::new();
        for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let matcher = Regex::new(&term_pattern(term, options.word_boundary))?;
            if matcher.is_match(MASK) {
                tracing::warn!(term, "skipping blacklist term that matches the redaction mask");
                continue;
            }
            if !options.word_boundary && joins_mask(term) {
                tracing::warn!(term, "skipping blacklist term that would match across the redaction mask");
                continue;
            }
            compiled.push(matcher);
        }

        Ok(Self {
            self_links,
            anonymized_base,
            terms: compiled,
            options,
        })
    }

    /// Redactor for `registration`, rewriting self links to
    /// `<public_url>/repository/<id>`.
    pub fn for_registration(registration: &Registration, public_url: &str) -> Result<Self, regex::Error> {
        let base = format!(
            "{}/repository/{}",
            public_url.trim_end_matches('/'),
            registration.id
        );
        Self::new(
            &registration.origin,
            &registration.terms,
            registration.options.clone(),
            base,
        )
    }

    /// Redact sensitive terms and URLs from content.
    pub fn redact(&self, content: &str) -> String {
        self.redact_with_report(content).0
    }

    /// Redact and report how many replacements each step made.
    pub fn redact_with_report(&self, content: &str) -> (String, Vec<RedactionInfo>) {
        let mut result = content.to_string();
        let mut redactions = Vec::new();

        if !self.options.image {
            let (next, count) = replace_counted(&MARKDOWN_IMAGE_PATTERN, &result, |_| String::new());
            result = next;
            push_info(&mut redactions, "image", count);
        }

        if !self.options.link {
            let (next, count) = replace_counted(&URL_PATTERN, &result, |_| MASK.to_string());
            result = next;
            push_info(&mut redactions, "link", count);
        }

        let mut self_link_count = 0;
        for pattern in &self.self_links {
            let (next, count) = replace_counted(pattern, &result, |_| self.anonymized_base.clone());
            result = next;
            self_link_count += count;
        }
        push_info(&mut redactions, "self_link", self_link_count);

        let mut url_count = 0;
        let mut term_count = 0;
        for term in &self.terms {
            if self.options.whole_url {
                let (next, count) = replace_counted_if(&URL_PATTERN, &result, |m| term.is_match(m));
                result = next;
                url_count += count;
            }

            let (next, count) = replace_counted(term, &result, |_| MASK.to_string());
            result = next;
            term_count += count;
        }
        push_info(&mut redactions, "url", url_count);
        push_info(&mut redactions, "term", term_count);

        (result, redactions)
    }

    pub fn anonymized_base(&self) -> &str {
        &self.anonymized_base
    }
}

fn push_info(redactions: &mut Vec<RedactionInfo>, kind: &str, count: usize) {
    if count > 0 {
        redactions.push(RedactionInfo {
            redaction_type: kind.to_string(),
            count,
        });
    }
}

fn replace_counted<F>(pattern: &Regex, content: &str, mut replacement: F) -> (String, usize)
where
    F: FnMut(&Captures<'_>) -> String,
{
    let mut count = 0;
    let replaced = pattern.replace_all(content, |caps: &Captures<'_>| {
        count += 1;
        replacement(caps)
    });
    (replaced.into_owned(), count)
}

/// Replace matches of `pattern` with the mask when `predicate` accepts them.
fn replace_counted_if<P>(pattern: &Regex, content: &str, predicate: P) -> (String, usize)
where
    P: Fn(&str) -> bool,
{
    let mut count = 0;
    let replaced = pattern.replace_all(content, |caps: &Captures<'_>| {
        let matched = &caps[0];
        if predicate(matched) {
            count += 1;
            MASK.to_string()
        } else {
            matched.to_string()
        }
    });
    (replaced.into_owned(), count)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `\b` only makes sense next to word characters; a term such as `@alice`
/// gets a boundary on its right edge only.
fn term_pattern(term: &str, word_boundary: bool) -> String {
    let escaped = regex::escape(term);
    if !word_boundary {
        return format!("(?i){}", escaped);
    }
    let left = if term.starts_with(is_word_char) { r"\b" } else { "" };
    let right = if term.ends_with(is_word_char) { r"\b" } else { "" };
    format!("(?i){}{}{}", left, escaped, right)
}

fn trailing_boundary(segment: &str) -> &'static str {
    if segment.ends_with(is_word_char) { r"\b" } else { "" }
}

/// Patterns for links pointing back at the origin, most specific first.
/// The scheme is optional so bare `github.com/owner/repo` mentions match too.
fn self_link_patterns(origin: &Origin) -> Vec<String> {
    let host = regex::escape(&origin.host);
    let owner = regex::escape(&origin.owner);
    let repo = regex::escape(&origin.repo);
    let branch = regex::escape(&origin.branch);
    let branch_end = trailing_boundary(&origin.branch);
    let repo_end = trailing_boundary(&origin.repo);
    let prefix = format!(r"(?i)(?:https?://)?(?:www\.)?{}/{}/{}", host, owner, repo);

    let raw = if origin.host == "github.com" {
        format!(
            r"(?i)(?:https?://)?raw\.githubusercontent\.com/{}/{}/{}{}",
            owner, repo, branch, branch_end
        )
    } else {
        format!(r"{}/raw/{}{}", prefix, branch, branch_end)
    };

    vec![
        format!("{}/blob/{}{}", prefix, branch, branch_end),
        format!("{}/tree/{}{}", prefix, branch, branch_end),
        raw,
        format!("{}{}", prefix, repo_end),
    ]
}

/// Without word boundaries, a term that starts or ends with the mask letter
/// can re-form around an inserted mask (`bx` turns `bbxx` into `bXXXx`).
fn joins_mask(term: &str) -> bool {
    let term = term.to_lowercase();
    MASK.chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .is_some_and(|c| term.starts_with(&c) || term.ends_with(&c))
}
