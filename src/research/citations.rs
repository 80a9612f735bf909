//! Cross-agent citation merging.
//!
//! Citations come from two places per agent: the structured citation list
//! the agent API returns, and links found in the (filtered) report text.
//! Both are normalized and deduplicated by URL, in fixed agent order.

use crate::agents::{AgentKind, RawCitation};
use crate::research::run::Citation;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]\n]+)\]\((https?://[^\s)]+)(?:\s+"[^"]*")?\)"#).unwrap()
});

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>()\[\]"'`]+"#).unwrap());

const TRACKING_PARAMS: [&str; 11] = [
    "gclid", "fbclid", "mc_cid", "mc_eid", "ref", "ref_src", "igshid", "msclkid", "yclid",
    "_hsenc", "_hsmi",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonical form of a citation URL, or `None` if it is not a usable
/// http(s) link.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return None;
    }

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Links found in report text: markdown links first (with their anchor text
/// as title), then bare URLs.
pub fn extract_links(text: &str) -> Vec<RawCitation> {
    let mut links: Vec<RawCitation> = MARKDOWN_LINK
        .captures_iter(text)
        .map(|cap| RawCitation::new(&cap[2]).with_title(cap[1].trim()))
        .collect();

    for m in BARE_URL.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '_']);
        if !links.iter().any(|l| l.url == url) {
            links.push(RawCitation::new(url));
        }
    }

    links
}

#[derive(Debug, Default)]
pub struct CitationAggregator {
    index: HashMap<String, usize>,
    citations: Vec<Citation>,
}

impl CitationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one citation. Unusable URLs are dropped; on a URL collision the
    /// first-seen metadata is kept and `agent` is recorded as a contributor.
    pub fn add(&mut self, agent: AgentKind, raw: RawCitation) {
        let Some(url) = normalize_url(&raw.url) else {
            tracing::debug!(agent = %agent, url = %raw.url, "Dropping unusable citation URL");
            return;
        };

        if let Some(&pos) = self.index.get(&url) {
            let existing = &mut self.citations[pos];
            if !existing.agents.contains(&agent) {
                existing.agents.push(agent);
            }
            return;
        }

        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| Url::parse(&url).ok()?.host_str().map(str::to_string))
            .unwrap_or_else(|| url.clone());

        self.index.insert(url.clone(), self.citations.len());
        self.citations.push(Citation {
            title,
            url,
            source_agent: agent,
            agents: vec![agent],
            date: raw.date,
            snippet: raw.snippet,
        });
    }

    /// Structured citations of one agent, then the links in its report.
    pub fn add_agent(&mut self, agent: AgentKind, structured: &[RawCitation], output: &str) {
        for citation in structured {
            self.add(agent, citation.clone());
        }
        for link in extract_links(output) {
            self.add(agent, link);
        }
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn finish(self) -> Vec<Citation> {
        self.citations
    }
}

/// Merge citations of several agents. Input order does not matter; agents
/// are always visited in their fixed order.
pub fn aggregate<'a>(
    inputs: impl IntoIterator<Item = (AgentKind, &'a [RawCitation], &'a str)>,
) -> Vec<Citation> {
    let mut inputs: Vec<_> = inputs.into_iter().collect();
    inputs.sort_by_key(|(kind, _, _)| *kind);

    let mut aggregator = CitationAggregator::new();
    for (kind, structured, output) in inputs {
        aggregator.add_agent(kind, structured, output);
    }
    aggregator.finish()
}
