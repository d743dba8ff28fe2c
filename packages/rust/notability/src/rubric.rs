//! Assessment rubric prompt and parsing of the collaborator's JSON answer.

use std::collections::HashSet;
use std::fmt::Write as _;

use entitygraph_shared::{EntityGraphError, Reference, ReferenceAssessment, Result, SourceCategory};
use serde::Deserialize;

/// Snippets are cut to this many characters in the prompt.
const MAX_SNIPPET_CHARS: usize = 300;

/// Build the grading prompt for `references` about `subject_name`.
pub fn build_prompt(subject_name: &str, references: &[Reference]) -> String {
    let mut prompt = format!(
        "You are assessing whether the local or small business \"{subject_name}\" is notable \
         enough for a public knowledge base.\n\n\
         For each reference below decide:\n\
         - source_category: one of government, news, academic, database, directory, review, company, other\n\
         - is_serious: government, news, academic, database, directory and review sources are serious\n\
         - is_publicly_available: readable without login or payment\n\
         - is_independent: not owned or written by the business itself (company pages are never independent)\n\
         - trust_score: integer 0-100\n\
         - reasoning: one sentence\n\n\
         Respond with JSON only, in exactly this shape:\n\
         {{\"assessments\":[{{\"index\":0,\"is_serious\":true,\"is_publicly_available\":true,\
         \"is_independent\":true,\"source_category\":\"news\",\"trust_score\":80,\"reasoning\":\"...\"}}],\
         \"summary\":\"...\",\"recommendations\":[\"...\"]}}\n\nReferences:\n"
    );

    for (index, reference) in references.iter().enumerate() {
        let snippet: String = reference.snippet.chars().take(MAX_SNIPPET_CHARS).collect();
        let _ = writeln!(
            prompt,
            "[{index}] {title}\n    url: {url}\n    domain: {domain}\n    snippet: {snippet}",
            title = reference.title,
            url = reference.url,
            domain = reference.source_domain,
        );
    }

    prompt
}

/// Remove surrounding ```` ``` ```` / ```` ```json ```` markers.
pub fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    assessments: Vec<RawAssessment>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    index: usize,
    #[serde(default)]
    is_serious: bool,
    #[serde(default)]
    is_publicly_available: bool,
    #[serde(default)]
    is_independent: bool,
    #[serde(default)]
    source_category: String,
    #[serde(default)]
    trust_score: f64,
    #[serde(default)]
    reasoning: String,
}

/// Parsed collaborator answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricResponse {
    pub assessments: Vec<ReferenceAssessment>,
    pub summary: Option<String>,
    pub recommendations: Vec<String>,
}

/// Parse the collaborator's answer for `reference_count` references.
///
/// Out-of-range or repeated indices are dropped; a response with no usable
/// assessment is an [`EntityGraphError::AssessmentParse`].
pub fn parse_response(raw: &str, reference_count: usize) -> Result<RubricResponse> {
    let cleaned = strip_code_fences(raw);
    let parsed: RawResponse = serde_json::from_str(cleaned)
        .or_else(|first| {
            // Answers sometimes wrap the JSON object in prose.
            match (cleaned.find('{'), cleaned.rfind('}')) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&cleaned[start..=end]).map_err(|_| first)
                }
                _ => Err(first),
            }
        })
        .map_err(|e| EntityGraphError::AssessmentParse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut assessments: Vec<ReferenceAssessment> = parsed
        .assessments
        .into_iter()
        .filter(|a| a.index < reference_count && seen.insert(a.index))
        .map(|a| {
            let category = SourceCategory::parse_lenient(&a.source_category);
            ReferenceAssessment {
                reference_index: a.index,
                is_serious: a.is_serious || category.is_serious(),
                is_publicly_available: a.is_publicly_available,
                is_independent: a.is_independent && category != SourceCategory::Company,
                source_category: category,
                trust_score: a.trust_score.round().clamp(0.0, 100.0) as u8,
                reasoning: a.reasoning,
            }
        })
        .collect();

    if assessments.is_empty() {
        return Err(EntityGraphError::AssessmentParse(
            "response contained no usable assessments".into(),
        ));
    }
    assessments.sort_by_key(|a| a.reference_index);

    Ok(RubricResponse {
        assessments,
        summary: parsed.summary.filter(|s| !s.trim().is_empty()),
        recommendations: parsed.recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"{
        "assessments": [
            {"index": 1, "is_serious": true, "is_publicly_available": true, "is_independent": true,
             "source_category": "news", "trust_score": 140, "reasoning": "local paper"},
            {"index": 0, "is_serious": false, "is_publicly_available": true, "is_independent": true,
             "source_category": "company", "trust_score": -5, "reasoning": "own site"},
            {"index": 7, "is_serious": true, "is_publicly_available": true, "is_independent": true,
             "source_category": "government", "trust_score": 90, "reasoning": "hallucinated"}
        ],
        "summary": "Covered by local press.",
        "recommendations": ["Get listed on the BBB"]
    }"#;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn parses_and_sanitizes() {
        let fenced = format!("```json\n{ANSWER}\n```");
        let response = parse_response(&fenced, 2).expect("parse");

        assert_eq!(response.assessments.len(), 2, "index 7 is out of range");
        let company = &response.assessments[0];
        assert_eq!(company.source_category, SourceCategory::Company);
        assert!(!company.is_independent, "company pages are never independent");
        assert_eq!(company.trust_score, 0);

        let news = &response.assessments[1];
        assert_eq!(news.trust_score, 100);
        assert!(news.qualifies());

        assert_eq!(response.summary.as_deref(), Some("Covered by local press."));
        assert_eq!(response.recommendations, vec!["Get listed on the BBB"]);
    }

    #[test]
    fn serious_category_implies_serious() {
        let raw = r#"{"assessments":[{"index":0,"is_serious":false,"is_publicly_available":true,
            "is_independent":true,"source_category":"directory","trust_score":55,"reasoning":""}]}"#;
        let response = parse_response(raw, 1).expect("parse");
        assert!(response.assessments[0].is_serious);
    }

    #[test]
    fn json_wrapped_in_prose() {
        let raw = format!("Here is my assessment:\n{ANSWER}\nLet me know if you need more.");
        assert!(parse_response(&raw, 2).is_ok());
    }

    #[test]
    fn unparsable_answer_is_an_error() {
        let err = parse_response("I cannot help with that.", 2).unwrap_err();
        assert!(matches!(err, EntityGraphError::AssessmentParse(_)));
    }

    #[test]
    fn empty_assessment_list_is_an_error() {
        let err = parse_response(r#"{"assessments": []}"#, 3).unwrap_err();
        assert!(matches!(err, EntityGraphError::AssessmentParse(_)));
    }

    #[test]
    fn prompt_lists_every_reference() {
        let refs = vec![
            Reference::new("https://yelp.com/biz/acme", "Acme - Yelp", "Great dentist"),
            Reference::new("https://austintexas.gov/acme", "Permit", ""),
        ];
        let prompt = build_prompt("Acme Dental", &refs);
        assert!(prompt.contains("\"Acme Dental\""));
        assert!(prompt.contains("[0] Acme - Yelp"));
        assert!(prompt.contains("[1] Permit"));
        assert!(prompt.contains("\"assessments\""));
    }
}
