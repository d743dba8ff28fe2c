//! Structured business data produced by the crawl collaborator.
//!
//! Every accessor treats blank strings and the literal placeholder `"unknown"`
//! (any case) as absent. Upstream extractors emit that placeholder when they
//! cannot find a value; it must never reach a search query or a published fact.

use serde::{Deserialize, Serialize};

/// Returns the trimmed value if it carries real data.
pub fn present(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(trimmed)
    }
}

/// Postal address fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Social profile URLs or handles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialProfiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
}

/// Crawled facts about a business. All fields optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_organization: Option<String>,
    #[serde(default)]
    pub social: SocialProfiles,
}

/// Addressable fields of [`SourceData`], used by property definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    Name,
    Description,
    Website,
    Phone,
    Email,
    Street,
    City,
    State,
    Country,
    PostalCode,
    Coordinates,
    Industry,
    Founded,
    EmployeeCount,
    Founder,
    Ceo,
    LegalForm,
    ParentOrganization,
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Youtube,
}

impl SourceData {
    /// Value of `field` as text, or `None` when absent or a placeholder.
    pub fn field(&self, field: SourceField) -> Option<String> {
        let text = |v: &Option<String>| present(v.as_deref()).map(str::to_string);
        match field {
            SourceField::Name => text(&self.name),
            SourceField::Description => text(&self.description),
            SourceField::Website => text(&self.website),
            SourceField::Phone => text(&self.phone),
            SourceField::Email => text(&self.email),
            SourceField::Street => text(&self.address.street),
            SourceField::City => text(&self.address.city),
            SourceField::State => text(&self.address.state),
            SourceField::Country => text(&self.address.country),
            SourceField::PostalCode => text(&self.address.postal_code),
            SourceField::Coordinates => self
                .coordinates
                .map(|c| format!("{},{}", c.latitude, c.longitude)),
            SourceField::Industry => text(&self.industry),
            SourceField::Founded => text(&self.founded),
            SourceField::EmployeeCount => self
                .employee_count
                .filter(|n| *n > 0)
                .map(|n| n.to_string()),
            SourceField::Founder => text(&self.founder),
            SourceField::Ceo => text(&self.ceo),
            SourceField::LegalForm => text(&self.legal_form),
            SourceField::ParentOrganization => text(&self.parent_organization),
            SourceField::Facebook => text(&self.social.facebook),
            SourceField::Instagram => text(&self.social.instagram),
            SourceField::Twitter => text(&self.social.twitter),
            SourceField::Linkedin => text(&self.social.linkedin),
            SourceField::Youtube => text(&self.social.youtube),
        }
    }

    /// Whether `field` carries a real value.
    pub fn has(&self, field: SourceField) -> bool {
        self.field(field).is_some()
    }

    /// Location from the address, or `None` when every part is absent.
    pub fn location(&self) -> Option<Location> {
        let location = Location {
            city: self.field(SourceField::City),
            state: self.field(SourceField::State),
            country: self.field(SourceField::Country),
        };
        (!location.is_empty()).then_some(location)
    }
}

/// Where a subject is located. Parts are individually optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            state: Some(state.into()),
            country: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        present(self.city.as_deref()).is_none()
            && present(self.state.as_deref()).is_none()
            && present(self.country.as_deref()).is_none()
    }

    /// `"City State"` for search queries, placeholders dropped.
    pub fn query_suffix(&self) -> String {
        [self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .filter_map(present)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `"City, State"` for human-readable text.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .filter_map(present)
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// How the subject's name was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOrigin {
    Crawled,
    UrlFallback,
}

/// The resolved name/location of the subject being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub origin: IdentityOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_placeholders_are_absent() {
        let data = SourceData {
            name: Some("Acme Dental".into()),
            address: Address {
                city: Some("Unknown".into()),
                state: Some("  ".into()),
                country: Some("US".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(data.field(SourceField::Name).as_deref(), Some("Acme Dental"));
        assert!(!data.has(SourceField::City));
        assert!(!data.has(SourceField::State));

        let location = data.location().expect("country is present");
        assert_eq!(location.city, None);
        assert_eq!(location.country.as_deref(), Some("US"));
    }

    #[test]
    fn all_placeholder_location_is_none() {
        let data = SourceData {
            address: Address {
                city: Some("unknown".into()),
                state: Some("UNKNOWN".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(data.location().is_none());
    }

    #[test]
    fn location_formatting() {
        let location = Location::new("Austin", "TX");
        assert_eq!(location.query_suffix(), "Austin TX");
        assert_eq!(location.display_name().as_deref(), Some("Austin, TX"));
    }

    #[test]
    fn zero_employee_count_is_absent() {
        let data = SourceData {
            employee_count: Some(0),
            ..Default::default()
        };
        assert!(!data.has(SourceField::EmployeeCount));
    }
}
