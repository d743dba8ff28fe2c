//! Notability evidence: search references, their assessments, and the verdict.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A third-party page found while looking for evidence about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub source_domain: String,
}

impl Reference {
    /// Build a reference, deriving `source_domain` from the URL host.
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        let url = url.into();
        let source_domain = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_default();
        Self {
            url,
            title: title.into(),
            snippet: snippet.into(),
            source_domain,
        }
    }
}

/// Kind of site a reference lives on. Declaration order is citation rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Government,
    News,
    Academic,
    Database,
    Directory,
    Review,
    Company,
    Other,
}

impl SourceCategory {
    /// Categories accepted as serious sources for local and small businesses.
    pub fn is_serious(&self) -> bool {
        matches!(
            self,
            Self::Government
                | Self::News
                | Self::Academic
                | Self::Database
                | Self::Directory
                | Self::Review
        )
    }

    /// Citation ordering rank; lower sorts first. Company pages rank with `Other`.
    pub fn citation_rank(&self) -> u8 {
        match self {
            Self::Government => 0,
            Self::News => 1,
            Self::Academic => 2,
            Self::Database => 3,
            Self::Directory => 4,
            Self::Review => 5,
            Self::Company | Self::Other => 6,
        }
    }

    /// Lenient parse of model output; unrecognized text maps to `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "government" | "gov" => Self::Government,
            "news" | "media" | "press" => Self::News,
            "academic" | "education" | "edu" => Self::Academic,
            "database" | "registry" => Self::Database,
            "directory" | "listing" => Self::Directory,
            "review" | "reviews" => Self::Review,
            "company" | "official" | "self" => Self::Company,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Government => "government",
            Self::News => "news",
            Self::Academic => "academic",
            Self::Database => "database",
            Self::Directory => "directory",
            Self::Review => "review",
            Self::Company => "company",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Quality judgement for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAssessment {
    pub reference_index: usize,
    pub is_serious: bool,
    pub is_publicly_available: bool,
    pub is_independent: bool,
    pub source_category: SourceCategory,
    /// 0-100.
    pub trust_score: u8,
    pub reasoning: String,
}

impl ReferenceAssessment {
    /// Serious, independent and publicly available.
    pub fn qualifies(&self) -> bool {
        self.is_serious && self.is_independent && self.is_publicly_available
    }
}

/// How a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentBasis {
    /// Text-assessment collaborator graded the references.
    Model,
    /// Deterministic keyword fallback.
    Heuristic,
    /// Daily search quota exhausted before any query ran.
    RateLimited,
    /// Search returned nothing usable.
    NoReferences,
}

/// Eligibility decision for publishing a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotabilityVerdict {
    pub is_notable: bool,
    /// 0.0-1.0.
    pub confidence: f64,
    pub basis: AssessmentBasis,
    pub total_references: usize,
    pub serious_reference_count: usize,
    pub publicly_available_count: usize,
    pub independent_count: usize,
    pub summary: String,
    /// At most five, best first.
    pub top_citations: Vec<Reference>,
    pub recommendations: Vec<String>,
}

impl NotabilityVerdict {
    /// Non-notable verdict with no assessed references.
    pub fn without_references(
        basis: AssessmentBasis,
        confidence: f64,
        summary: impl Into<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            is_notable: false,
            confidence,
            basis,
            total_references: 0,
            serious_reference_count: 0,
            publicly_available_count: 0,
            independent_count: 0,
            summary: summary.into(),
            top_citations: Vec::new(),
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_derives_domain() {
        let r = Reference::new("https://www.yelp.com/biz/acme-dental", "Acme Dental - Yelp", "");
        assert_eq!(r.source_domain, "yelp.com");

        let r = Reference::new("not a url", "x", "");
        assert_eq!(r.source_domain, "");
    }

    #[test]
    fn citation_rank_follows_declaration_order() {
        let mut cats = vec![
            SourceCategory::Review,
            SourceCategory::Government,
            SourceCategory::Directory,
            SourceCategory::News,
        ];
        cats.sort_by_key(SourceCategory::citation_rank);
        assert_eq!(
            cats,
            vec![
                SourceCategory::Government,
                SourceCategory::News,
                SourceCategory::Directory,
                SourceCategory::Review
            ]
        );
    }

    #[test]
    fn company_and_other_are_not_serious() {
        assert!(!SourceCategory::Company.is_serious());
        assert!(!SourceCategory::Other.is_serious());
        assert!(SourceCategory::Directory.is_serious());
    }

    #[test]
    fn lenient_category_parse() {
        assert_eq!(SourceCategory::parse_lenient(" News "), SourceCategory::News);
        assert_eq!(SourceCategory::parse_lenient("blog"), SourceCategory::Other);
    }
}
