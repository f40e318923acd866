//! Dossier synthesis — narrative briefing from draft + enrichment + findings.

use std::sync::Arc;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{ContactDraft, EnrichmentResult, Finding};

const DOSSIER_MAX_TOKENS: u32 = 2048;

/// Snippet length included per finding in the synthesis context.
const CONTEXT_SNIPPET_CHARS: usize = 1000;

/// Synthesizes a contact dossier with the language model.
///
/// Synthesis never fails the pipeline: an LLM error or empty output falls
/// back to a minimal dossier built from the draft, so the record write
/// still proceeds.
pub struct DossierSynthesizer {
    llm: Arc<dyn LlmProvider>,
}

impl DossierSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn synthesize(
        &self,
        draft: &ContactDraft,
        enrichment: Option<&EnrichmentResult>,
        findings: &[Finding],
    ) -> String {
        let context = build_context(draft, enrichment, findings);
        let request = CompletionRequest::new(vec![ChatMessage::user(build_dossier_prompt(
            &context,
            findings.is_empty(),
        ))])
        .with_max_tokens(DOSSIER_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                tracing::debug!(
                    chars = response.content.len(),
                    output_tokens = response.output_tokens,
                    cost_usd = %response.cost(self.llm.cost_per_token()),
                    "Dossier synthesized"
                );
                response.content
            }
            Ok(_) => {
                tracing::warn!("Dossier synthesis returned empty output, using fallback");
                fallback_dossier(draft)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dossier synthesis failed (non-fatal), using fallback");
                fallback_dossier(draft)
            }
        }
    }
}

/// Assemble everything known about the contact into the synthesis context.
fn build_context(
    draft: &ContactDraft,
    enrichment: Option<&EnrichmentResult>,
    findings: &[Finding],
) -> String {
    let mut sections = vec![format!("Original note from meeting: {}", draft.raw_note)];

    if let Ok(parsed) = serde_json::to_string(draft) {
        sections.push(format!("Parsed contact info: {parsed}"));
    }

    if let Some(e) = enrichment {
        if let Ok(json) = serde_json::to_string(e) {
            sections.push(format!("People-database enrichment: {json}"));
        }
    }

    if !findings.is_empty() {
        let mut block = String::from("Web research results:");
        for (i, f) in findings.iter().enumerate() {
            let snippet: String = f.snippet.chars().take(CONTEXT_SNIPPET_CHARS).collect();
            block.push_str(&format!("\n  [{}] {} ({})\n  {}", i + 1, f.title, f.url, snippet));
        }
        sections.push(block);
    }

    sections.join("\n\n")
}

fn build_dossier_prompt(context: &str, findings_empty: bool) -> String {
    let thin_research_note = if findings_empty {
        "\n\nThere are no web research results for this person. Keep the dossier \
         short, work only from the note and any enrichment data, and say plainly \
         that public information is thin. Do NOT invent research."
    } else {
        ""
    };

    format!(
        "Based on the following information about a person I just met, write a \
         concise dossier/briefing.\n\n{context}\n\n\
         Write the dossier using these sections (skip any section where you \
         genuinely have no information — do NOT fabricate):\n\n\
         **Background:** Career history, education, key roles. Be specific with \
         companies, titles, and dates where available.\n\n\
         **Current Role:** What they do now, their responsibilities, recent \
         initiatives or focus areas.\n\n\
         **Recent Activity:** Articles, talks, panels, projects, or news \
         mentions. Include specifics — titles, dates, venues.\n\n\
         **Company Context:** What's happening at their company that's relevant \
         — strategy, news, challenges, market position.\n\n\
         **Connection Points:** Based on my note about our conversation, what \
         are natural threads to continue? Shared interests, mutual challenges, \
         collaboration angles.\n\n\
         **Suggested Approach:** A specific, actionable follow-up suggestion \
         that references something concrete from the note or research. Not \
         generic — make it something only someone who did their homework would \
         say. Always include this section.\n\n\
         Be direct and specific. No filler, no corporate speak. If the web \
         research is thin, say so honestly rather than padding with \
         generalities.{thin_research_note}"
    )
}

/// Minimal dossier built from the draft alone. Always non-empty and always
/// carries a follow-up suggestion.
fn fallback_dossier(draft: &ContactDraft) -> String {
    let who = match (draft.name.as_deref(), draft.company.as_deref()) {
        (Some(n), Some(c)) => format!("{n} ({c})"),
        (Some(n), None) => n.to_string(),
        (None, Some(c)) => format!("an unnamed contact at {c}"),
        (None, None) => "an unnamed contact".to_string(),
    };

    let mut dossier = format!("**Contact:** {who}\n\n**Meeting Note:** {}", draft.raw_note);
    if let Some(context) = &draft.meeting_context {
        dossier.push_str(&format!("\n\n**Discussed:** {context}"));
    }

    let follow_up = draft
        .follow_up
        .as_deref()
        .unwrap_or("Reach out within a week and reference the conversation from your note.");
    dossier.push_str(&format!("\n\n**Suggested Approach:** {follow_up}"));
    dossier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ContactDraft {
        let mut d = ContactDraft::new("Met Sarah Chen from General Mills. Talked about organic line.");
        d.name = Some("Sarah Chen".into());
        d.company = Some("General Mills".into());
        d.meeting_context = Some("Talked about organic line.".into());
        d.follow_up = Some("Send the organic category report".into());
        d
    }

    fn findings() -> Vec<Finding> {
        vec![Finding {
            title: "Keynote at FoodTech".into(),
            url: "https://a.example".into(),
            snippet: "Sarah Chen spoke about organic brands".into(),
        }]
    }

    #[test]
    fn context_includes_note_and_findings() {
        let context = build_context(&draft(), None, &findings());
        assert!(context.contains("Original note from meeting"));
        assert!(context.contains("Sarah Chen"));
        assert!(context.contains("[1] Keynote at FoodTech"));
        assert!(context.contains("https://a.example"));
    }

    #[test]
    fn context_without_findings_has_no_research_section() {
        let context = build_context(&draft(), None, &[]);
        assert!(!context.contains("Web research results"));
    }

    #[test]
    fn context_includes_enrichment_when_present() {
        let enrichment = EnrichmentResult {
            name: Some("Sarah Chen".into()),
            title: Some("VP Brand Strategy".into()),
            email: None,
            linkedin_url: None,
            company: None,
            company_website: None,
            location: None,
            confidence_note: "Apollo match: Sarah Chen".into(),
        };
        let context = build_context(&draft(), Some(&enrichment), &[]);
        assert!(context.contains("People-database enrichment"));
        assert!(context.contains("VP Brand Strategy"));
    }

    #[test]
    fn prompt_demands_specific_follow_up() {
        let prompt = build_dossier_prompt("ctx", false);
        assert!(prompt.contains("Suggested Approach"));
        assert!(prompt.contains("Not generic"));
        assert!(prompt.contains("do NOT fabricate"));
        assert!(!prompt.contains("no web research results"));
    }

    #[test]
    fn prompt_degrades_honestly_without_findings() {
        let prompt = build_dossier_prompt("ctx", true);
        assert!(prompt.contains("no web research results"));
        assert!(prompt.contains("Do NOT invent research"));
    }

    #[test]
    fn fallback_dossier_is_non_empty_with_follow_up() {
        let dossier = fallback_dossier(&draft());
        assert!(!dossier.is_empty());
        assert!(dossier.contains("Suggested Approach"));
        assert!(dossier.contains("Send the organic category report"));
    }

    #[test]
    fn fallback_dossier_handles_anonymous_draft() {
        let anon = ContactDraft::new("a note with no name");
        let dossier = fallback_dossier(&anon);
        assert!(dossier.contains("an unnamed contact"));
        assert!(dossier.contains("Suggested Approach"));
    }
}
