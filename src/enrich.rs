//! Contact enrichment via the Apollo people-search API.
//!
//! Enrichment is best-effort throughout: provider errors and no-matches
//! leave the draft untouched and are logged, never surfaced as pipeline
//! errors.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::pipeline::types::{non_empty, EnrichmentResult};

const APOLLO_SEARCH_URL: &str = "https://api.apollo.io/api/v1/mixed_people/api_search";

/// People-data lookup capability.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Look up a person by name, optionally disambiguated by company domain.
    /// `Ok(None)` means no match — not an error.
    async fn lookup(
        &self,
        name: &str,
        company_domain: Option<&str>,
    ) -> anyhow::Result<Option<EnrichmentResult>>;
}

/// Apollo-backed enricher.
pub struct ApolloEnricher {
    api_key: SecretString,
    client: reqwest::Client,
}

impl ApolloEnricher {
    pub fn new(api_key: SecretString, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[async_trait]
impl Enricher for ApolloEnricher {
    async fn lookup(
        &self,
        name: &str,
        company_domain: Option<&str>,
    ) -> anyhow::Result<Option<EnrichmentResult>> {
        let mut payload = serde_json::json!({
            "q_person_name": name,
            "page": 1,
            "per_page": 1,
        });
        if let Some(domain) = company_domain {
            payload["q_organization_domains"] = serde_json::json!(domain);
        }

        let resp = self
            .client
            .post(APOLLO_SEARCH_URL)
            .header("X-Api-Key", self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Apollo search failed: {status} — {}",
                err.chars().take(200).collect::<String>()
            );
        }

        let data: serde_json::Value = resp.json().await?;
        Ok(parse_people_response(&data))
    }
}

/// Sentinel for the unconfigured enrichment capability.
pub struct UnconfiguredEnricher;

#[async_trait]
impl Enricher for UnconfiguredEnricher {
    async fn lookup(
        &self,
        _name: &str,
        _company_domain: Option<&str>,
    ) -> anyhow::Result<Option<EnrichmentResult>> {
        Ok(None)
    }
}

/// Pull the top person match out of an Apollo search response.
fn parse_people_response(data: &serde_json::Value) -> Option<EnrichmentResult> {
    let person = data
        .get("people")
        .and_then(serde_json::Value::as_array)?
        .first()?;

    let field = |v: &serde_json::Value, key: &str| {
        non_empty(v.get(key).and_then(serde_json::Value::as_str).map(String::from))
    };

    let org = person.get("organization").cloned().unwrap_or_default();
    let location = [
        field(person, "city"),
        field(person, "state"),
        field(person, "country"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");

    let name = field(person, "name");
    let title = field(person, "title");
    let confidence_note = match (&name, &title) {
        (Some(n), Some(t)) => format!("Apollo match: {n} — {t}"),
        (Some(n), None) => format!("Apollo match: {n}"),
        _ => "Apollo match with no name returned".to_string(),
    };

    Some(EnrichmentResult {
        name,
        title,
        email: field(person, "email"),
        linkedin_url: field(person, "linkedin_url"),
        company: field(&org, "name"),
        company_website: field(&org, "website_url"),
        location: non_empty(Some(location)),
        confidence_note,
    })
}
