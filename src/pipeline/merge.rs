//! Field precedence — the single place merge rules live.
//!
//! Precedence per field, highest first:
//!
//! | field                          | precedence                      |
//! |--------------------------------|---------------------------------|
//! | name, company, title, email,   | vision > parser > enrichment    |
//! | phone                          | (enrichment fills empty only)   |
//! | linkedin_url, company_website, | enrichment only                 |
//! | location                       |                                 |
//! | event, meeting_context,        | parser only (text/caption is    |
//! | follow_up, company_domain      | the authoritative source)       |
//!
//! Vision overwrites because the business card is the authoritative source
//! for identity fields. Enrichment never overwrites anything.

use crate::pipeline::types::{non_empty, ContactDraft, ContactFields, EnrichmentResult};

/// Overlay vision-extracted card fields onto a text-parsed draft.
pub fn apply_vision(draft: &mut ContactDraft, fields: &ContactFields) {
    overwrite(&mut draft.name, &fields.name);
    overwrite(&mut draft.company, &fields.company);
    overwrite(&mut draft.title, &fields.title);
    overwrite(&mut draft.email, &fields.email);
    overwrite(&mut draft.phone, &fields.phone);
}

/// Merge an enrichment result into the draft, filling only empty fields.
pub fn apply_enrichment(draft: &mut ContactDraft, enrichment: &EnrichmentResult) {
    fill_if_empty(&mut draft.title, &enrichment.title);
    fill_if_empty(&mut draft.email, &enrichment.email);
    fill_if_empty(&mut draft.company, &enrichment.company);
}

fn overwrite(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = non_empty(value.clone()) {
        *slot = Some(v);
    }
}

fn fill_if_empty(slot: &mut Option<String>, value: &Option<String>) {
    if non_empty(slot.clone()).is_none() {
        *slot = non_empty(value.clone());
    }
}
