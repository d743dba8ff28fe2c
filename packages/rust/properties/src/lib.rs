//! Strategic property selection.
//!
//! Decides which structured facts a subscription tier receives for an entity,
//! given the source data actually available. Pure functions over the fixed
//! [`catalog`]; no I/O, no state.
//!
//! A property is included when it is `required`, or when the caller's tier
//! reaches the property's tier, any agency enrichment gate is met, and its
//! source field (if it has one) is populated.

mod catalog;

use entitygraph_shared::{PropertyId, SourceData, Tier};
use serde::Serialize;
use tracing::debug;

pub use catalog::{
    BUSINESS_ITEM, DataOrigin, Priority, PropertyCategory, PropertyDefinition, catalog, definition,
};

// ---------------------------------------------------------------------------
// Selection result
// ---------------------------------------------------------------------------

/// One selected property with its selection metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedProperty {
    pub id: PropertyId,
    pub label: &'static str,
    pub category: PropertyCategory,
    pub priority: Priority,
    pub origin: DataOrigin,
    /// Whether the data this property draws on is present.
    pub required_data_available: bool,
}

impl SelectedProperty {
    fn from_definition(definition: &PropertyDefinition, data_available: bool) -> Self {
        Self {
            id: definition.id.clone(),
            label: definition.label,
            category: definition.category,
            priority: definition.priority,
            origin: definition.origin,
            required_data_available: data_available,
        }
    }
}

/// Ordered output of [`select_properties`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertySelectionResult {
    pub properties: Vec<SelectedProperty>,
}

impl PropertySelectionResult {
    pub fn ids(&self) -> Vec<PropertyId> {
        self.properties.iter().map(|p| p.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.properties.iter().any(|p| p.id.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn data_available(definition: &PropertyDefinition, source: Option<&SourceData>) -> bool {
    match definition.origin {
        DataOrigin::Source(field) => source.is_some_and(|s| s.has(field)),
        DataOrigin::Hardcoded(_) | DataOrigin::Subject => true,
    }
}

fn tier_eligible(definition: &PropertyDefinition, tier: Tier) -> bool {
    definition.tier <= tier
}

fn enrichment_eligible(definition: &PropertyDefinition, enrichment_level: Option<u32>) -> bool {
    definition
        .min_enrichment_level
        .is_none_or(|min| enrichment_level.unwrap_or(0) >= min)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Select the properties to populate for `tier`.
///
/// Output is sorted by priority class, ties broken by catalog order, and is
/// identical for identical arguments.
pub fn select_properties(
    tier: Tier,
    enrichment_level: Option<u32>,
    source: Option<&SourceData>,
) -> PropertySelectionResult {
    let mut properties: Vec<SelectedProperty> = catalog()
        .iter()
        .filter_map(|definition| {
            let available = data_available(definition, source);
            let included = definition.priority == Priority::Required
                || (tier_eligible(definition, tier)
                    && enrichment_eligible(definition, enrichment_level)
                    && available);
            included.then(|| SelectedProperty::from_definition(definition, available))
        })
        .collect();

    // Stable: equal priorities keep catalog order.
    properties.sort_by_key(|p| p.priority);

    debug!(
        %tier,
        enrichment_level = enrichment_level.unwrap_or(0),
        selected = properties.len(),
        "properties selected"
    );

    PropertySelectionResult { properties }
}

/// Properties eligible for `tier` with populated source data that are not yet
/// in `already_included`. Enrichment gates are ignored, so agency callers see
/// what a higher enrichment level would add.
pub fn recommend_properties(
    already_included: &[PropertyId],
    source: &SourceData,
    tier: Tier,
) -> Vec<SelectedProperty> {
    catalog()
        .iter()
        .filter(|d| tier_eligible(d, tier))
        .filter(|d| d.origin.is_source_data() && data_available(d, Some(source)))
        .filter(|d| !already_included.contains(&d.id))
        .map(|d| SelectedProperty::from_definition(d, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitygraph_shared::{Address, Coordinates, SocialProfiles};
    use std::collections::HashSet;

    fn full_source() -> SourceData {
        SourceData {
            name: Some("Acme Dental LLC".into()),
            description: Some("Family dentistry".into()),
            website: Some("https://acmedental.test".into()),
            phone: Some("+1 512 555 0100".into()),
            email: Some("hello@acmedental.test".into()),
            address: Address {
                street: Some("100 Main St".into()),
                city: Some("Austin".into()),
                state: Some("TX".into()),
                country: Some("United States".into()),
                postal_code: Some("78701".into()),
            },
            coordinates: Some(Coordinates {
                latitude: 30.2672,
                longitude: -97.7431,
            }),
            industry: Some("dentistry".into()),
            founded: Some("2009".into()),
            employee_count: Some(14),
            founder: Some("Jane Doe".into()),
            ceo: Some("Jane Doe".into()),
            legal_form: Some("limited liability company".into()),
            parent_organization: Some("Acme Health Group".into()),
            social: SocialProfiles {
                facebook: Some("https://facebook.com/acmedental".into()),
                instagram: Some("https://instagram.com/acmedental".into()),
                twitter: Some("https://x.com/acmedental".into()),
                linkedin: Some("https://linkedin.com/company/acme-dental".into()),
                youtube: Some("https://youtube.com/channel/UC123".into()),
            },
        }
    }

    fn id_set(result: &PropertySelectionResult) -> HashSet<String> {
        result.properties.iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn required_properties_always_included() {
        for tier in [Tier::Free, Tier::Pro, Tier::Agency] {
            let result = select_properties(tier, None, None);
            assert!(result.contains("P31"));
            assert!(result.contains("P856"));
            assert_eq!(result.len(), 2, "only required properties without data");
        }
    }

    #[test]
    fn source_properties_need_populated_fields() {
        let source = SourceData {
            name: Some("Acme Dental".into()),
            phone: Some("unknown".into()),
            ..Default::default()
        };
        let result = select_properties(Tier::Free, None, Some(&source));
        assert!(result.contains("P1448"));
        assert!(!result.contains("P1329"), "placeholder phone must not count");
    }

    #[test]
    fn output_sorted_by_priority_then_catalog_order() {
        let source = full_source();
        let result = select_properties(Tier::Agency, Some(3), Some(&source));
        let priorities: Vec<Priority> = result.properties.iter().map(|p| p.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);

        let ids: Vec<String> = result.properties.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(&ids[..4], &["P31", "P856", "P1448", "P17"]);
    }

    #[test]
    fn selection_is_deterministic() {
        let source = full_source();
        let a = select_properties(Tier::Pro, None, Some(&source));
        let b = select_properties(Tier::Pro, None, Some(&source));
        assert_eq!(a, b);
    }

    #[test]
    fn tier_containment() {
        let source = full_source();
        let free = id_set(&select_properties(Tier::Free, None, Some(&source)));
        let pro = id_set(&select_properties(Tier::Pro, None, Some(&source)));
        let agency0 = id_set(&select_properties(Tier::Agency, Some(0), Some(&source)));

        assert!(free.is_subset(&pro));
        assert!(pro.is_subset(&agency0));
        assert!(pro.contains("P625"));
        assert!(!free.contains("P625"));
    }

    #[test]
    fn agency_sets_grow_with_enrichment_level() {
        let source = full_source();
        let mut previous = id_set(&select_properties(Tier::Agency, Some(0), Some(&source)));
        for level in 1..=4 {
            let current = id_set(&select_properties(Tier::Agency, Some(level), Some(&source)));
            assert!(previous.is_subset(&current), "level {level} dropped properties");
            previous = current;
        }
        assert!(previous.contains("P749"));
        assert!(previous.contains("P1454"));
    }

    #[test]
    fn enrichment_level_ignored_below_agency() {
        let source = full_source();
        let pro = select_properties(Tier::Pro, Some(3), Some(&source));
        assert!(!pro.contains("P1128"));
    }

    #[test]
    fn data_availability_flag() {
        let result = select_properties(Tier::Free, None, None);
        assert!(result.properties.iter().all(|p| p.required_data_available));
    }

    #[test]
    fn recommendations_exclude_included_properties() {
        let source = full_source();
        let included = select_properties(Tier::Agency, Some(1), Some(&source));
        let recommended = recommend_properties(&included.ids(), &source, Tier::Agency);

        let recommended_ids: HashSet<String> =
            recommended.iter().map(|p| p.id.to_string()).collect();
        assert!(recommended_ids.contains("P112"));
        assert!(recommended_ids.contains("P749"));
        assert!(!recommended_ids.contains("P1128"), "already included at level 1");
        assert!(recommended.iter().all(|p| p.origin.is_source_data()));
    }

    #[test]
    fn recommendations_respect_tier() {
        let source = full_source();
        let included = select_properties(Tier::Free, None, Some(&source));
        let recommended = recommend_properties(&included.ids(), &source, Tier::Free);
        assert!(recommended.is_empty(), "free tier already has every free property");
    }

    #[test]
    fn selection_serializes() {
        let result = select_properties(Tier::Free, None, None);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["properties"][0]["id"], "P31");
        assert_eq!(json["properties"][0]["priority"], "required");
    }
}
