//! Entity parser — structured contact extraction from free-form notes.
//!
//! Delegates to the language model: the prompt tolerates conversational
//! phrasing ("met Sarah Chen from General Mills") and returns null for
//! anything not mentioned. A note with no usable name still yields a
//! draft — downstream stages tolerate it and the record is flagged.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::CaptureError;
use crate::llm::{extract_json_object, ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{non_empty, ContactDraft};

const PARSE_MAX_TOKENS: u32 = 1024;
const PARSE_TEMPERATURE: f32 = 0.1;

/// LLM-backed contact parser.
pub struct EntityParser {
    llm: Arc<dyn LlmProvider>,
}

impl EntityParser {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Parse a raw note into a contact draft.
    ///
    /// `raw_note` is preserved verbatim on the returned draft.
    pub async fn parse(&self, raw_note: &str) -> Result<ContactDraft, CaptureError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You extract structured contact information from quick notes \
                 someone jotted down after meeting a person.",
            ),
            ChatMessage::user(build_parse_prompt(raw_note)),
        ])
        .with_temperature(PARSE_TEMPERATURE)
        .with_max_tokens(PARSE_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| CaptureError::Parsing(e.to_string()))?;

        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %response.cost(self.llm.cost_per_token()),
            "Contact note parsed"
        );

        parse_contact_response(&response.content, raw_note).map_err(CaptureError::Parsing)
    }
}

fn build_parse_prompt(raw_note: &str) -> String {
    format!(
        "Extract contact information from this note. Someone just met this \
         person at an event or meeting and quickly jotted this down.\n\n\
         Note: \"{raw_note}\"\n\n\
         Return a JSON object with these fields (use null for anything not mentioned):\n\
         {{\n\
           \"name\": \"Full name of the person\",\n\
           \"company\": \"Company or organization name\",\n\
           \"title\": \"Job title or role if mentioned\",\n\
           \"email\": \"Email address if mentioned\",\n\
           \"phone\": \"Phone number if mentioned\",\n\
           \"event\": \"Event name or location where they met\",\n\
           \"context\": \"Key topics discussed, interests, or notable details\",\n\
           \"follow_up\": \"One concrete suggested follow-up action based on the context\",\n\
           \"search_company_domain\": \"Best guess at company website domain for enrichment (e.g. kelloggs.com). null if unsure.\"\n\
         }}\n\n\
         Return ONLY valid JSON. No markdown, no explanation."
    )
}

#[derive(Debug, Deserialize)]
struct ParsedContact {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    follow_up: Option<String>,
    #[serde(default)]
    search_company_domain: Option<String>,
}

fn parse_contact_response(raw: &str, raw_note: &str) -> Result<ContactDraft, String> {
    let json_str = extract_json_object(raw);
    let parsed: ParsedContact =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let mut draft = ContactDraft::new(raw_note);
    draft.name = non_empty(parsed.name);
    draft.company = non_empty(parsed.company);
    draft.title = non_empty(parsed.title);
    draft.email = non_empty(parsed.email);
    draft.phone = non_empty(parsed.phone);
    draft.event = non_empty(parsed.event);
    draft.meeting_context = non_empty(parsed.context);
    draft.follow_up = non_empty(parsed.follow_up);
    draft.company_domain = non_empty(parsed.search_company_domain);
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prompt_embeds_note() {
        let prompt = build_parse_prompt("Met Joe from Kellogg's");
        assert!(prompt.contains("Met Joe from Kellogg's"));
        assert!(prompt.contains("search_company_domain"));
        assert!(prompt.contains("follow_up"));
    }

    #[test]
    fn parse_full_response() {
        let raw = r#"{
            "name": "Sarah Chen",
            "company": "General Mills",
            "title": "VP Brand Strategy",
            "email": null,
            "phone": null,
            "event": null,
            "context": "Talked about organic line.",
            "follow_up": "Send the organic category report",
            "search_company_domain": "generalmills.com"
        }"#;
        let note = "Just met Sarah Chen from General Mills, VP Brand Strategy. Talked about organic line.";
        let draft = parse_contact_response(raw, note).unwrap();

        assert_eq!(draft.raw_note, note);
        assert_eq!(draft.name.as_deref(), Some("Sarah Chen"));
        assert_eq!(draft.company.as_deref(), Some("General Mills"));
        assert_eq!(draft.title.as_deref(), Some("VP Brand Strategy"));
        assert_eq!(draft.email, None);
        assert_eq!(draft.meeting_context.as_deref(), Some("Talked about organic line."));
        assert_eq!(draft.company_domain.as_deref(), Some("generalmills.com"));
    }

    #[test]
    fn parse_markdown_wrapped_response() {
        let raw = "```json\n{\"name\": \"Joe Blogs\", \"company\": \"Kellogg's\"}\n```";
        let draft = parse_contact_response(raw, "note").unwrap();
        assert_eq!(draft.name.as_deref(), Some("Joe Blogs"));
        assert_eq!(draft.company.as_deref(), Some("Kellogg's"));
    }

    #[test]
    fn parse_without_name_is_not_an_error() {
        let raw = r#"{"name": null, "context": "talked at a booth"}"#;
        let draft = parse_contact_response(raw, "someone at a booth").unwrap();
        assert!(!draft.has_name());
        assert_eq!(draft.meeting_context.as_deref(), Some("talked at a booth"));
    }

    #[test]
    fn parse_empty_strings_become_none() {
        let raw = r#"{"name": "", "company": "  ", "title": "VP"}"#;
        let draft = parse_contact_response(raw, "note").unwrap();
        assert!(draft.name.is_none());
        assert!(draft.company.is_none());
        assert_eq!(draft.title.as_deref(), Some("VP"));
    }

    #[test]
    fn parse_keeps_raw_note_verbatim() {
        let note = "  oddly formatted   note\nwith newlines ";
        let draft = parse_contact_response(r#"{"name": "X"}"#, note).unwrap();
        assert_eq!(draft.raw_note, note);
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_contact_response("I couldn't find any contact info, sorry!", "note").is_err());
    }
}
