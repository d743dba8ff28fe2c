//! The fixed catalog of entity properties, in declaration (tie-break) order.

use entitygraph_shared::{PropertyId, SourceField, Tier};
use serde::Serialize;

/// Knowledge-base item for "business".
pub const BUSINESS_ITEM: &str = "Q4830453";

/// Selection priority. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Required,
    High,
    Medium,
    Low,
    Optional,
}

/// Grouping used for display and upsell suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyCategory {
    Classification,
    Identity,
    Location,
    Contact,
    History,
    Social,
    Organization,
}

/// Where a property's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DataOrigin {
    /// Constant item id; never carries provenance.
    Hardcoded(&'static str),
    /// The subject URL itself.
    Subject,
    /// A crawled field; included only when populated.
    Source(SourceField),
}

impl DataOrigin {
    pub fn is_source_data(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDefinition {
    pub id: PropertyId,
    pub label: &'static str,
    pub category: PropertyCategory,
    /// Lowest tier that may receive this property.
    pub tier: Tier,
    /// Agency-only gate on enrichment level.
    pub min_enrichment_level: Option<u32>,
    pub priority: Priority,
    pub origin: DataOrigin,
}

const fn def(
    id: &'static str,
    label: &'static str,
    category: PropertyCategory,
    tier: Tier,
    min_enrichment_level: Option<u32>,
    priority: Priority,
    origin: DataOrigin,
) -> PropertyDefinition {
    PropertyDefinition {
        id: PropertyId::from_static(id),
        label,
        category,
        tier,
        min_enrichment_level,
        priority,
        origin,
    }
}

use DataOrigin::{Hardcoded, Source, Subject};
use Priority::{High, Low, Medium, Optional, Required};
use PropertyCategory::{Classification, Contact, History, Identity, Location, Organization, Social};

static CATALOG: &[PropertyDefinition] = &[
    def("P31", "instance of", Classification, Tier::Free, None, Required, Hardcoded(BUSINESS_ITEM)),
    def("P856", "official website", Identity, Tier::Free, None, Required, Subject),
    def("P1448", "official name", Identity, Tier::Free, None, High, Source(SourceField::Name)),
    def("P17", "country", Location, Tier::Free, None, High, Source(SourceField::Country)),
    def("P131", "located in the administrative territorial entity", Location, Tier::Free, None, Medium, Source(SourceField::City)),
    def("P6375", "street address", Location, Tier::Free, None, Medium, Source(SourceField::Street)),
    def("P1329", "phone number", Contact, Tier::Free, None, Medium, Source(SourceField::Phone)),
    def("P625", "coordinate location", Location, Tier::Pro, None, Medium, Source(SourceField::Coordinates)),
    def("P452", "industry", Classification, Tier::Pro, None, Medium, Source(SourceField::Industry)),
    def("P281", "postal code", Location, Tier::Pro, None, Low, Source(SourceField::PostalCode)),
    def("P968", "email address", Contact, Tier::Pro, None, Low, Source(SourceField::Email)),
    def("P571", "inception", History, Tier::Pro, None, Low, Source(SourceField::Founded)),
    def("P2013", "Facebook ID", Social, Tier::Pro, None, Low, Source(SourceField::Facebook)),
    def("P2003", "Instagram username", Social, Tier::Pro, None, Low, Source(SourceField::Instagram)),
    def("P2002", "X username", Social, Tier::Pro, None, Low, Source(SourceField::Twitter)),
    def("P4264", "LinkedIn company ID", Social, Tier::Pro, None, Low, Source(SourceField::Linkedin)),
    def("P2397", "YouTube channel ID", Social, Tier::Agency, Some(1), Optional, Source(SourceField::Youtube)),
    def("P1128", "employees", Organization, Tier::Agency, Some(1), Optional, Source(SourceField::EmployeeCount)),
    def("P112", "founded by", Organization, Tier::Agency, Some(2), Optional, Source(SourceField::Founder)),
    def("P169", "chief executive officer", Organization, Tier::Agency, Some(2), Optional, Source(SourceField::Ceo)),
    def("P1454", "legal form", Organization, Tier::Agency, Some(3), Optional, Source(SourceField::LegalForm)),
    def("P749", "parent organization", Organization, Tier::Agency, Some(3), Optional, Source(SourceField::ParentOrganization)),
];

/// All property definitions in catalog order.
pub fn catalog() -> &'static [PropertyDefinition] {
    CATALOG
}

/// Look up a definition by property id.
pub fn definition(id: &str) -> Option<&'static PropertyDefinition> {
    CATALOG.iter().find(|d| d.id.as_str() == id)
}
