//! Web research via the Exa search API.
//!
//! Findings are additive context for the dossier: provider errors degrade
//! to an empty result set and the total is bounded so a common name never
//! fans out unbounded.

use std::collections::HashSet;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::pipeline::types::{ContactDraft, Finding};

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";

/// Results requested per query.
const RESULTS_PER_QUERY: usize = 5;

/// Hard cap on findings handed to the synthesizer.
pub const MAX_FINDINGS: usize = 8;

/// Snippet length requested from the provider.
const SNIPPET_MAX_CHARS: usize = 1500;

/// Semantic web search capability.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Gather recent public activity for the drafted identity.
    /// Degrades internally — never errors, never aborts the pipeline.
    async fn research(&self, draft: &ContactDraft) -> Vec<Finding>;
}

/// Exa-backed researcher.
pub struct ExaResearcher {
    api_key: SecretString,
    client: reqwest::Client,
}

impl ExaResearcher {
    pub fn new(api_key: SecretString, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }

    async fn search_one(&self, query: &str) -> anyhow::Result<Vec<Finding>> {
        let resp = self
            .client
            .post(EXA_SEARCH_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&serde_json::json!({
                "query": query,
                "num_results": RESULTS_PER_QUERY,
                "type": "neural",
                "contents": {
                    "text": { "max_characters": SNIPPET_MAX_CHARS },
                },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Exa search failed: {status} — {}",
                err.chars().take(200).collect::<String>()
            );
        }

        let data: serde_json::Value = resp.json().await?;
        Ok(parse_search_response(&data))
    }
}

#[async_trait]
impl Researcher for ExaResearcher {
    async fn research(&self, draft: &ContactDraft) -> Vec<Finding> {
        let queries = build_queries(draft);
        let mut findings = Vec::new();
        let mut seen_urls = HashSet::new();

        for query in &queries {
            match self.search_one(query).await {
                Ok(results) => {
                    for finding in results {
                        if findings.len() >= MAX_FINDINGS {
                            break;
                        }
                        if seen_urls.insert(finding.url.clone()) {
                            findings.push(finding);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Research query failed (non-fatal)");
                }
            }
            if findings.len() >= MAX_FINDINGS {
                break;
            }
        }

        tracing::info!(
            findings = findings.len(),
            queries = queries.len(),
            "Web research complete"
        );
        findings
    }
}

/// Sentinel for the unconfigured research capability.
pub struct UnconfiguredResearcher;

#[async_trait]
impl Researcher for UnconfiguredResearcher {
    async fn research(&self, _draft: &ContactDraft) -> Vec<Finding> {
        Vec::new()
    }
}

/// Build search queries from whatever identity the draft has.
///
/// With a company known, a second query biases toward public activity
/// (interviews, talks, articles). Returns no queries when both name and
/// company are empty — the caller skips the stage entirely.
pub fn build_queries(draft: &ContactDraft) -> Vec<String> {
    let name = draft.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let company = draft
        .company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    match (name, company) {
        (Some(n), Some(c)) => vec![
            format!("{n} {c}"),
            format!("{n} {c} interview OR keynote OR article OR LinkedIn"),
        ],
        (Some(n), None) => vec![n.to_string()],
        (None, Some(c)) => vec![c.to_string()],
        (None, None) => Vec::new(),
    }
}

fn parse_search_response(data: &serde_json::Value) -> Vec<Finding> {
    data.get("results")
        .and_then(serde_json::Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| {
                    let url = r.get("url").and_then(serde_json::Value::as_str)?;
                    if url.is_empty() {
                        return None;
                    }
                    Some(Finding {
                        title: r
                            .get("title")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        url: url.to_string(),
                        snippet: r
                            .get("text")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: Option<&str>, company: Option<&str>) -> ContactDraft {
        let mut d = ContactDraft::new("note");
        d.name = name.map(String::from);
        d.company = company.map(String::from);
        d
    }

    #[tokio::test]
    async fn unconfigured_researcher_returns_empty() {
        let findings = UnconfiguredResearcher
            .research(&draft(Some("Sarah Chen"), Some("General Mills")))
            .await;
        assert!(findings.is_empty());
    }

    #[test]
    fn queries_with_name_and_company() {
        let queries = build_queries(&draft(Some("Sarah Chen"), Some("General Mills")));
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], "Sarah Chen General Mills");
        assert!(queries[1].contains("interview OR keynote"));
    }

    #[test]
    fn queries_with_name_only() {
        let queries = build_queries(&draft(Some("Sarah Chen"), None));
        assert_eq!(queries, vec!["Sarah Chen".to_string()]);
    }

    #[test]
    fn queries_with_company_only() {
        let queries = build_queries(&draft(None, Some("General Mills")));
        assert_eq!(queries, vec!["General Mills".to_string()]);
    }

    #[test]
    fn no_queries_when_identity_empty() {
        assert!(build_queries(&draft(None, None)).is_empty());
        assert!(build_queries(&draft(Some("  "), Some(""))).is_empty());
    }

    #[test]
    fn parse_search_results() {
        let data = serde_json::json!({
            "results": [
                {"title": "Keynote at FoodTech", "url": "https://a.example", "text": "Sarah Chen spoke about..."},
                {"title": "", "url": "https://b.example", "text": ""},
                {"title": "no url", "text": "dropped"},
            ]
        });
        let findings = parse_search_response(&data);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].title, "Keynote at FoodTech");
        assert_eq!(findings[1].url, "https://b.example");
    }

    #[test]
    fn parse_search_empty_response() {
        assert!(parse_search_response(&serde_json::json!({})).is_empty());
        assert!(parse_search_response(&serde_json::json!({"results": []})).is_empty());
    }
}
