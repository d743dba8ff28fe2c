//! Entity construction: selected properties + source data → [`CandidateEntity`].

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;
use url::Url;

use entitygraph_properties::{DataOrigin, PropertySelectionResult, SelectedProperty};
use entitygraph_shared::{
    CandidateEntity, Fact, FactValue, ProvenanceOrigin, ProvenanceReference, Reference, Result,
    SourceData, SourceField, SubjectIdentity,
};

/// Descriptions longer than this are cut on a word boundary.
pub const MAX_DESCRIPTION_CHARS: usize = 250;

const LANGUAGE: &str = "en";

static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4})(?:-(\d{1,2}))?(?:-(\d{1,2}))?").expect("valid date regex")
});

/// Inputs for [`build_entity`].
pub struct EntityInput<'a> {
    pub subject: &'a SubjectIdentity,
    pub subject_url: &'a str,
    pub source: &'a SourceData,
    /// Only crawled data that was actually fetched gets provenance.
    pub crawl_succeeded: bool,
    pub selection: &'a PropertySelectionResult,
    pub retrieved_at: DateTime<Utc>,
}

/// Assemble a candidate entity. Fails with a validation error if the result
/// would not be publish-ready.
pub fn build_entity(input: &EntityInput<'_>) -> Result<CandidateEntity> {
    let mut entity = CandidateEntity::default();
    entity
        .labels
        .insert(LANGUAGE.into(), input.subject.name.trim().to_string());
    entity
        .descriptions
        .insert(LANGUAGE.into(), describe(input.subject, input.source));

    let crawl_reference = input.crawl_succeeded.then(|| ProvenanceReference {
        url: input.subject_url.to_string(),
        title: None,
        retrieved_at: input.retrieved_at,
        origin: ProvenanceOrigin::Crawl,
    });

    for property in &input.selection.properties {
        let Some(value) = fact_value(property, input.subject_url, input.source) else {
            debug!(property = %property.id, "no value, fact omitted");
            continue;
        };
        let provenance = match (&property.origin, &crawl_reference) {
            (DataOrigin::Source(_), Some(reference)) => vec![reference.clone()],
            _ => Vec::new(),
        };
        entity.push_fact(Fact {
            property_id: property.id.clone(),
            value,
            provenance,
        });
    }

    entity.ensure_publish_ready()?;
    Ok(entity)
}

/// Attach notability citations to the official-name fact, or the website fact
/// when there is no official name. Returns how many references were added.
pub fn attach_citations(
    entity: &mut CandidateEntity,
    citations: &[Reference],
    retrieved_at: DateTime<Utc>,
) -> usize {
    let target = if entity.fact("P1448").is_some() { "P1448" } else { "P856" };
    let Some(fact) = entity.fact_mut(target) else {
        return 0;
    };

    let mut added = 0;
    for citation in citations {
        if fact.provenance.iter().any(|p| p.url == citation.url) {
            continue;
        }
        fact.provenance.push(ProvenanceReference {
            url: citation.url.clone(),
            title: (!citation.title.is_empty()).then(|| citation.title.clone()),
            retrieved_at,
            origin: ProvenanceOrigin::NotabilityEvidence,
        });
        added += 1;
    }
    added
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

fn fact_value(property: &SelectedProperty, subject_url: &str, source: &SourceData) -> Option<FactValue> {
    let field = match property.origin {
        DataOrigin::Hardcoded(item) => return Some(FactValue::Item(item.to_string())),
        DataOrigin::Subject => return Some(FactValue::Url(subject_url.to_string())),
        DataOrigin::Source(field) => field,
    };

    let monolingual = |text: String| FactValue::MonolingualText {
        text,
        language: LANGUAGE.into(),
    };

    match field {
        SourceField::Name | SourceField::Street => source.field(field).map(monolingual),
        SourceField::Coordinates => source.coordinates.map(|c| FactValue::GlobeCoordinate {
            latitude: c.latitude,
            longitude: c.longitude,
        }),
        SourceField::EmployeeCount => source
            .employee_count
            .filter(|n| *n > 0)
            .map(|n| FactValue::Quantity(i64::from(n))),
        SourceField::Founded => source.field(field).and_then(|d| wikibase_time(&d)).map(FactValue::Time),
        SourceField::Email => source
            .field(field)
            .map(|e| FactValue::Url(format!("mailto:{}", e.trim_start_matches("mailto:")))),
        SourceField::Website => source.field(field).map(FactValue::Url),
        SourceField::Facebook
        | SourceField::Instagram
        | SourceField::Twitter
        | SourceField::Linkedin
        | SourceField::Youtube => source
            .field(field)
            .and_then(|url| social_handle(field, &url))
            .map(FactValue::String),
        _ => source.field(field).map(FactValue::String),
    }
}

/// `"2009"` / `"2009-03"` / `"2009-03-15"` → `"+2009-03-15T00:00:00Z"`;
/// missing parts become `00`.
pub fn wikibase_time(raw: &str) -> Option<String> {
    let caps = DATE_PREFIX.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    Some(format!(
        "+{}-{:02}-{:02}T00:00:00Z",
        &caps[1],
        part(2),
        part(3)
    ))
}

/// Reduce a profile URL to the identifier the knowledge base stores.
///
/// - Facebook/Instagram/X: first path segment (`facebook.com/acme` → `acme`)
/// - LinkedIn: the company slug (`linkedin.com/company/acme-co` → `acme-co`)
/// - YouTube: channel id, or the `@handle`/`c/` name
///
/// Plain handles (no URL) are returned with any leading `@` removed.
pub fn social_handle(field: SourceField, raw: &str) -> Option<String> {
    let raw = raw.trim();
    let Ok(url) = Url::parse(raw) else {
        let handle = raw.trim_start_matches('@');
        return (!handle.is_empty() && !handle.contains('/')).then(|| handle.to_string());
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let handle: Option<String> = match field {
        SourceField::Linkedin => match segments.as_slice() {
            ["company" | "in" | "school", slug, ..] => Some(slug.to_string()),
            [slug, ..] => Some(slug.to_string()),
            [] => None,
        },
        SourceField::Youtube => match segments.as_slice() {
            ["channel" | "c" | "user", id, ..] => Some(id.to_string()),
            [first, ..] => Some(first.to_string()),
            [] => None,
        },
        SourceField::Facebook => match segments.as_slice() {
            ["profile.php", ..] => url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned()),
            ["pages", _, id, ..] => Some(id.to_string()),
            [first, ..] => Some(first.to_string()),
            [] => None,
        },
        _ => segments.first().map(|s| s.to_string()),
    };

    handle
        .map(|h| h.trim_start_matches('@').to_string())
        .filter(|h| !h.is_empty())
}

/// Description text: crawled description (word-boundary truncated), else a
/// synthesized `"<industry> in <City>, <State>"`.
fn describe(subject: &SubjectIdentity, source: &SourceData) -> String {
    if let Some(description) = source.field(SourceField::Description) {
        return truncate_on_word(&description, MAX_DESCRIPTION_CHARS);
    }

    let kind = source
        .field(SourceField::Industry)
        .unwrap_or_else(|| "business".to_string());
    let place = subject
        .location
        .as_ref()
        .and_then(|l| l.display_name())
        .or_else(|| source.location().and_then(|l| l.display_name()));

    match place {
        Some(place) => format!("{kind} in {place}"),
        None => kind,
    }
}

/// Cut `text` to at most `max` characters, backing up to the last space.
pub fn truncate_on_word(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut,
    }
}
