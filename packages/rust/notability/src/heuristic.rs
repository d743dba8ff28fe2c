//! Deterministic keyword classifier used when the text-assessment collaborator
//! is unavailable or its answer cannot be parsed.

use entitygraph_shared::{Reference, ReferenceAssessment, SourceCategory};

use crate::query::compact_name;

const GOVERNMENT: &[&str] = &[".gov", ".mil", "gov."];
const ACADEMIC: &[&str] = &[".edu", ".ac."];
const NEWS: &[&str] = &[
    "news",
    "times",
    "tribune",
    "herald",
    "gazette",
    "journal",
    "patch.com",
    "reuters",
    "apnews",
    "bizjournals",
];
const DATABASE: &[&str] = &[
    "wikipedia",
    "wikidata",
    "crunchbase",
    "opencorporates",
    "dnb.com",
    "bloomberg",
    "zoominfo",
];
const DIRECTORY: &[&str] = &[
    "yelp",
    "google",
    "yellowpages",
    "bbb.org",
    "mapquest",
    "foursquare",
    "manta",
    "directory",
    "chamberofcommerce",
];
const REVIEW: &[&str] = &[
    "review",
    "tripadvisor",
    "trustpilot",
    "healthgrades",
    "zocdoc",
    "angi",
];

/// Shorter subject keys only match a whole domain label.
const MIN_SUBSTRING_KEY_LEN: usize = 5;

fn contains_any(domain: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| domain.contains(k))
}

fn is_company_domain(domain: &str, subject_key: &str) -> bool {
    if subject_key.is_empty() {
        return false;
    }
    if subject_key.len() >= MIN_SUBSTRING_KEY_LEN {
        return compact_name(domain).contains(subject_key);
    }
    domain.split('.').any(|label| compact_name(label) == subject_key)
}

/// Classify a source domain. First match wins; `subject_key` is the compacted
/// subject name used to recognise company-owned sites.
pub fn classify_domain(domain: &str, subject_key: &str) -> SourceCategory {
    let domain = domain.to_ascii_lowercase();

    if contains_any(&domain, GOVERNMENT) {
        SourceCategory::Government
    } else if is_company_domain(&domain, subject_key) {
        SourceCategory::Company
    } else if contains_any(&domain, ACADEMIC) {
        SourceCategory::Academic
    } else if contains_any(&domain, NEWS) {
        SourceCategory::News
    } else if contains_any(&domain, DATABASE) {
        SourceCategory::Database
    } else if contains_any(&domain, DIRECTORY) {
        SourceCategory::Directory
    } else if contains_any(&domain, REVIEW) {
        SourceCategory::Review
    } else {
        SourceCategory::Other
    }
}

/// Fixed trust score per category.
pub fn trust_score(category: SourceCategory) -> u8 {
    match category {
        SourceCategory::Government => 90,
        SourceCategory::Academic => 85,
        SourceCategory::News => 75,
        SourceCategory::Database => 70,
        SourceCategory::Directory => 55,
        SourceCategory::Review => 50,
        SourceCategory::Company => 30,
        SourceCategory::Other => 25,
    }
}

fn is_public_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Assess every reference with the keyword table.
pub fn assess_references(references: &[Reference], subject_key: &str) -> Vec<ReferenceAssessment> {
    references
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let category = classify_domain(&reference.source_domain, subject_key);
            ReferenceAssessment {
                reference_index: index,
                is_serious: category.is_serious(),
                is_publicly_available: is_public_url(&reference.url),
                is_independent: category != SourceCategory::Company,
                source_category: category,
                trust_score: trust_score(category),
                reasoning: format!("keyword match on {} → {category}", reference.source_domain),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table() {
        let cases = [
            ("austintexas.gov", SourceCategory::Government),
            ("army.mil", SourceCategory::Government),
            ("gov.uk", SourceCategory::Government),
            ("utexas.edu", SourceCategory::Academic),
            ("ox.ac.uk", SourceCategory::Academic),
            ("statesman-news.com", SourceCategory::News),
            ("bizjournals.com", SourceCategory::News),
            ("en.wikipedia.org", SourceCategory::Database),
            ("opencorporates.com", SourceCategory::Database),
            ("yelp.com", SourceCategory::Directory),
            ("maps.google.com", SourceCategory::Directory),
            ("bbb.org", SourceCategory::Directory),
            ("tripadvisor.com", SourceCategory::Review),
            ("healthgrades.com", SourceCategory::Review),
            ("randomblog.net", SourceCategory::Other),
        ];
        for (domain, expected) in cases {
            assert_eq!(classify_domain(domain, "acmedental"), expected, "{domain}");
        }
    }

    #[test]
    fn company_domain_detected_before_other_keywords() {
        assert_eq!(
            classify_domain("acme-dental-reviews.com", "acmedental"),
            SourceCategory::Company
        );
        assert_eq!(
            classify_domain("acmedental.gov", "acmedental"),
            SourceCategory::Government,
            "government outranks company"
        );
    }

    #[test]
    fn short_subject_key_needs_whole_label() {
        assert_eq!(classify_domain("abcnews.com", "ab"), SourceCategory::News);
        assert_eq!(classify_domain("joesrestaurantreviews.com", "joe"), SourceCategory::Review);
        assert_eq!(classify_domain("joe.com", "joe"), SourceCategory::Company);
        assert_eq!(classify_domain("shop.joe.com", "joe"), SourceCategory::Company);
        assert_eq!(classify_domain("ab-news.org", "ab"), SourceCategory::News);
    }

    #[test]
    fn empty_subject_key_never_matches_company() {
        assert_eq!(classify_domain("anything.com", ""), SourceCategory::Other);
    }

    #[test]
    fn single_gov_reference_qualifies() {
        let refs = vec![Reference::new(
            "https://www.sos.state.tx.gov/entity/123",
            "Acme Dental LLC - Business Entity",
            "",
        )];
        let assessments = assess_references(&refs, "acmedental");
        assert_eq!(assessments.len(), 1);
        let a = &assessments[0];
        assert_eq!(a.source_category, SourceCategory::Government);
        assert_eq!(a.trust_score, 90);
        assert!(a.qualifies());
    }

    #[test]
    fn company_pages_are_not_independent() {
        let refs = vec![Reference::new("https://acmedental.com/about", "About", "")];
        let a = &assess_references(&refs, "acmedental")[0];
        assert_eq!(a.source_category, SourceCategory::Company);
        assert!(!a.is_independent);
        assert!(!a.is_serious);
        assert_eq!(a.trust_score, 30);
    }
}
