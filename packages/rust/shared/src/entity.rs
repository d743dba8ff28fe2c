//! Candidate knowledge-graph entity: labels, descriptions, typed facts with provenance.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EntityGraphError, Result};

/// A knowledge-base property identifier such as `P31`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub Cow<'static, str>);

impl PropertyId {
    /// Identifier backed by a static string, usable in `const` catalogs.
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed value of a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    /// Reference to another knowledge-base item (e.g. `Q4830453`).
    Item(String),
    String(String),
    MonolingualText { text: String, language: String },
    Url(String),
    Quantity(i64),
    /// ISO-8601-ish date text (`2015`, `2015-03-01`).
    Time(String),
    GlobeCoordinate { latitude: f64, longitude: f64 },
}

impl FactValue {
    /// Wikibase datavalue rendering.
    pub fn to_datavalue(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Self::Item(id) => json!({
                "type": "wikibase-entityid",
                "value": { "entity-type": "item", "id": id },
            }),
            Self::String(s) | Self::Url(s) => json!({ "type": "string", "value": s }),
            Self::MonolingualText { text, language } => json!({
                "type": "monolingualtext",
                "value": { "text": text, "language": language },
            }),
            Self::Quantity(amount) => json!({
                "type": "quantity",
                "value": { "amount": format!("{amount:+}"), "unit": "1" },
            }),
            Self::Time(time) => json!({ "type": "time", "value": { "time": time } }),
            Self::GlobeCoordinate {
                latitude,
                longitude,
            } => json!({
                "type": "globecoordinate",
                "value": { "latitude": latitude, "longitude": longitude, "precision": 0.0001 },
            }),
        }
    }
}

/// Where a provenance reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceOrigin {
    Crawl,
    NotabilityEvidence,
}

/// A citation backing a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceReference {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub retrieved_at: DateTime<Utc>,
    pub origin: ProvenanceOrigin,
}

/// One typed statement about the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub property_id: PropertyId,
    pub value: FactValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<ProvenanceReference>,
}

/// A knowledge-graph entity assembled from source data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
    /// Language code → label.
    pub labels: BTreeMap<String, String>,
    /// Language code → description.
    pub descriptions: BTreeMap<String, String>,
    /// Ordered, at most one fact per property.
    pub facts: Vec<Fact>,
}

impl CandidateEntity {
    /// Insert a fact, replacing any existing fact for the same property in place.
    pub fn push_fact(&mut self, fact: Fact) {
        match self
            .facts
            .iter_mut()
            .find(|f| f.property_id == fact.property_id)
        {
            Some(existing) => *existing = fact,
            None => self.facts.push(fact),
        }
    }

    pub fn fact(&self, property_id: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.property_id.as_str() == property_id)
    }

    pub fn fact_mut(&mut self, property_id: &str) -> Option<&mut Fact> {
        self.facts
            .iter_mut()
            .find(|f| f.property_id.as_str() == property_id)
    }

    /// At least one label and one fact.
    pub fn is_publish_ready(&self) -> bool {
        self.labels.values().any(|l| !l.trim().is_empty()) && !self.facts.is_empty()
    }

    /// Error out unless [`is_publish_ready`](Self::is_publish_ready).
    pub fn ensure_publish_ready(&self) -> Result<()> {
        if self.labels.values().all(|l| l.trim().is_empty()) {
            return Err(EntityGraphError::validation("entity has no label"));
        }
        if self.facts.is_empty() {
            return Err(EntityGraphError::validation("entity has no facts"));
        }
        Ok(())
    }

    /// Total provenance references across all facts.
    pub fn reference_count(&self) -> usize {
        self.facts.iter().map(|f| f.provenance.len()).sum()
    }

    /// Render in the Wikibase edit-entity JSON shape.
    pub fn to_wikibase_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value, json};

        let terms = |map: &BTreeMap<String, String>| -> Value {
            map.iter()
                .map(|(lang, text)| (lang.clone(), json!({ "language": lang, "value": text })))
                .collect::<Map<String, Value>>()
                .into()
        };

        let mut claims = Map::new();
        for fact in &self.facts {
            let references: Vec<Value> = fact
                .provenance
                .iter()
                .map(|r| {
                    json!({
                        "snaks": {
                            "P854": [{
                                "snaktype": "value",
                                "property": "P854",
                                "datavalue": { "type": "string", "value": r.url },
                            }],
                            "P813": [{
                                "snaktype": "value",
                                "property": "P813",
                                "datavalue": {
                                    "type": "time",
                                    "value": { "time": r.retrieved_at.format("+%Y-%m-%dT00:00:00Z").to_string() },
                                },
                            }],
                        },
                    })
                })
                .collect();

            let claim = json!({
                "mainsnak": {
                    "snaktype": "value",
                    "property": fact.property_id.as_str(),
                    "datavalue": fact.value.to_datavalue(),
                },
                "type": "statement",
                "rank": "normal",
                "references": references,
            });
            claims.insert(fact.property_id.to_string(), json!([claim]));
        }

        json!({
            "labels": terms(&self.labels),
            "descriptions": terms(&self.descriptions),
            "claims": claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: &'static str, value: FactValue) -> Fact {
        Fact {
            property_id: PropertyId::from_static(id),
            value,
            provenance: vec![],
        }
    }

    #[test]
    fn publish_ready_needs_label_and_fact() {
        let mut entity = CandidateEntity::default();
        assert!(!entity.is_publish_ready());
        assert!(entity.ensure_publish_ready().is_err());

        entity.labels.insert("en".into(), "Acme Dental".into());
        assert!(!entity.is_publish_ready());

        entity.push_fact(fact("P31", FactValue::Item("Q4830453".into())));
        assert!(entity.is_publish_ready());
        assert!(entity.ensure_publish_ready().is_ok());
    }

    #[test]
    fn push_fact_replaces_same_property() {
        let mut entity = CandidateEntity::default();
        entity.push_fact(fact("P1329", FactValue::String("555-0100".into())));
        entity.push_fact(fact("P856", FactValue::Url("https://acme.test".into())));
        entity.push_fact(fact("P1329", FactValue::String("555-0199".into())));

        assert_eq!(entity.facts.len(), 2);
        assert_eq!(entity.facts[0].property_id.as_str(), "P1329");
        assert_eq!(entity.facts[0].value, FactValue::String("555-0199".into()));
    }

    #[test]
    fn wikibase_json_shape() {
        let mut entity = CandidateEntity::default();
        entity.labels.insert("en".into(), "Acme Dental".into());
        entity.descriptions.insert("en".into(), "dental clinic in Austin, TX".into());
        entity.push_fact(Fact {
            property_id: PropertyId::from_static("P856"),
            value: FactValue::Url("https://acme.test".into()),
            provenance: vec![ProvenanceReference {
                url: "https://acme.test".into(),
                title: None,
                retrieved_at: Utc::now(),
                origin: ProvenanceOrigin::Crawl,
            }],
        });
        entity.push_fact(fact("P1128", FactValue::Quantity(12)));

        let json = entity.to_wikibase_json();
        assert_eq!(json["labels"]["en"]["value"], "Acme Dental");
        assert_eq!(json["claims"]["P856"][0]["mainsnak"]["datavalue"]["value"], "https://acme.test");
        assert_eq!(json["claims"]["P856"][0]["references"].as_array().unwrap().len(), 1);
        assert_eq!(json["claims"]["P1128"][0]["mainsnak"]["datavalue"]["value"]["amount"], "+12");
        assert_eq!(entity.reference_count(), 1);
    }
}
