//! Structured business data extraction from a homepage.
//!
//! Sources, strongest first: schema.org JSON-LD blocks, `og:`/`meta` tags,
//! `<title>`, then `tel:`/`mailto:` and social-profile links. A field is only
//! filled from a weaker source when the stronger ones left it empty.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use entitygraph_shared::{Coordinates, SourceData, present};

/// schema.org types treated as the business node, besides anything ending in
/// `Business` or `Organization`.
const BUSINESS_TYPES: &[&str] = &[
    "Corporation",
    "Dentist",
    "Physician",
    "MedicalClinic",
    "Restaurant",
    "Store",
    "Attorney",
    "LegalService",
    "ProfessionalService",
    "HomeAndConstructionBusiness",
    "AutoRepair",
    "HealthClub",
    "BeautySalon",
    "RealEstateAgent",
];

/// Generic types that say nothing about the industry.
const GENERIC_TYPES: &[&str] = &["LocalBusiness", "Organization", "Corporation", "Thing"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extract everything we can about the business behind `page_url`.
pub fn extract_source_data(html: &str, page_url: &Url) -> SourceData {
    let doc = Html::parse_document(html);
    let mut data = SourceData {
        website: Some(page_url.to_string()),
        ..Default::default()
    };

    if let Some(node) = find_business_node(&doc) {
        apply_json_ld(&mut data, &node);
    }
    apply_meta(&mut data, &doc);
    apply_links(&mut data, &doc, page_url);

    debug!(
        name = data.name.as_deref().unwrap_or("-"),
        city = data.address.city.as_deref().unwrap_or("-"),
        "extracted source data"
    );
    data
}

// ---------------------------------------------------------------------------
// JSON-LD
// ---------------------------------------------------------------------------

fn find_business_node(doc: &Html) -> Option<Value> {
    let script_sel = selector(r#"script[type="application/ld+json"]"#);
    doc.select(&script_sel)
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .flat_map(flatten_nodes)
        .find(is_business_node)
}

/// A JSON-LD block may be a node, an array of nodes, or a `@graph`.
fn flatten_nodes(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(flatten_nodes).collect(),
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten_nodes(graph),
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    }
}

fn node_types(node: &Value) -> Vec<&str> {
    match node.get("@type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn is_business_node(node: &Value) -> bool {
    node_types(node).iter().any(|t| {
        t.ends_with("Business") || t.ends_with("Organization") || BUSINESS_TYPES.contains(t)
    })
}

/// String value of a field, or the `name` of a nested object, or the first
/// element of an array.
fn text(node: &Value, key: &str) -> Option<String> {
    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => present(Some(s.as_str())).map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(map) => map.get("name").and_then(as_text),
            Value::Array(items) => items.iter().find_map(as_text),
            _ => None,
        }
    }
    node.get(key).and_then(as_text)
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => number(map.get("value").or_else(|| map.get("minValue"))),
        _ => None,
    }
}

/// `"MedicalClinic"` → `"medical clinic"`.
fn humanize_type(t: &str) -> String {
    let mut out = String::new();
    for (i, c) in t.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn apply_json_ld(data: &mut SourceData, node: &Value) {
    data.name = text(node, "name").or_else(|| text(node, "legalName"));
    data.description = text(node, "description");
    data.phone = text(node, "telephone");
    data.email = text(node, "email").map(|e| e.trim_start_matches("mailto:").to_string());
    data.founded = text(node, "foundingDate");
    data.founder = text(node, "founder");
    data.ceo = text(node, "ceo");
    data.legal_form = text(node, "legalForm");
    data.parent_organization = text(node, "parentOrganization");
    data.employee_count = number(node.get("numberOfEmployees"))
        .filter(|n| *n >= 1.0)
        .map(|n| n as u32);
    data.industry = node_types(node)
        .into_iter()
        .find(|t| !GENERIC_TYPES.contains(t))
        .map(humanize_type);

    if let Some(address) = node.get("address") {
        data.address.street = text(address, "streetAddress");
        data.address.city = text(address, "addressLocality");
        data.address.state = text(address, "addressRegion");
        data.address.country = text(address, "addressCountry");
        data.address.postal_code = text(address, "postalCode");
    }

    if let Some(geo) = node.get("geo") {
        if let (Some(latitude), Some(longitude)) =
            (number(geo.get("latitude")), number(geo.get("longitude")))
        {
            data.coordinates = Some(Coordinates {
                latitude,
                longitude,
            });
        }
    }

    if let Some(Value::Array(links)) = node.get("sameAs") {
        for link in links.iter().filter_map(Value::as_str) {
            assign_social(data, link);
        }
    }
}

// ---------------------------------------------------------------------------
// Meta tags and links
// ---------------------------------------------------------------------------

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css);
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|c| present(Some(c)).map(str::to_string))
}

/// First segment of a `"Name | Tagline"` style title.
fn title_name(title: &str) -> Option<String> {
    let first = title
        .split(['|', '–', '—'])
        .next()
        .unwrap_or(title)
        .split(" - ")
        .next()
        .unwrap_or(title);
    present(Some(first)).map(str::to_string)
}

fn apply_meta(data: &mut SourceData, doc: &Html) {
    if data.name.is_none() {
        data.name = meta_content(doc, r#"meta[property="og:site_name"]"#).or_else(|| {
            let title_sel = selector("title");
            doc.select(&title_sel)
                .next()
                .and_then(|el| title_name(&el.text().collect::<String>()))
        });
    }
    if data.description.is_none() {
        data.description = meta_content(doc, r#"meta[name="description"]"#)
            .or_else(|| meta_content(doc, r#"meta[property="og:description"]"#));
    }
    if data.address.city.is_none() {
        data.address.city = meta_content(doc, r#"meta[property="business:contact_data:locality"]"#);
    }
    if data.address.state.is_none() {
        data.address.state = meta_content(doc, r#"meta[property="business:contact_data:region"]"#);
    }
}

const SOCIAL_HOSTS: &[(&str, SocialNetwork)] = &[
    ("facebook.com", SocialNetwork::Facebook),
    ("instagram.com", SocialNetwork::Instagram),
    ("twitter.com", SocialNetwork::Twitter),
    ("x.com", SocialNetwork::Twitter),
    ("linkedin.com", SocialNetwork::Linkedin),
    ("youtube.com", SocialNetwork::Youtube),
];

#[derive(Debug, Clone, Copy)]
enum SocialNetwork {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Youtube,
}

/// Record `link` as a social profile if its host is a known network and the
/// slot is still empty.
fn assign_social(data: &mut SourceData, link: &str) {
    let Ok(url) = Url::parse(link) else {
        return;
    };
    let Some(host) = url.host_str() else {
        return;
    };
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    if url.path().trim_matches('/').is_empty() {
        return;
    }

    let Some((_, network)) = SOCIAL_HOSTS
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
    else {
        return;
    };

    let slot = match network {
        SocialNetwork::Facebook => &mut data.social.facebook,
        SocialNetwork::Instagram => &mut data.social.instagram,
        SocialNetwork::Twitter => &mut data.social.twitter,
        SocialNetwork::Linkedin => &mut data.social.linkedin,
        SocialNetwork::Youtube => &mut data.social.youtube,
    };
    if slot.is_none() {
        *slot = Some(link.to_string());
    }
}

fn apply_links(data: &mut SourceData, doc: &Html, base_url: &Url) {
    let link_sel = selector("a[href]");
    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };

        if let Some(number) = href.strip_prefix("tel:") {
            if data.phone.is_none() {
                data.phone = present(Some(number)).map(str::to_string);
            }
        } else if let Some(address) = href.strip_prefix("mailto:") {
            if data.email.is_none() {
                let address = address.split('?').next().unwrap_or(address);
                data.email = present(Some(address)).map(str::to_string);
            }
        } else if let Ok(resolved) = base_url.join(href) {
            assign_social(data, resolved.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://www.acmedental.test/").expect("valid url")
    }

    const JSON_LD_PAGE: &str = r#"<!doctype html>
<html><head>
<title>Acme Dental | Family Dentistry in Austin</title>
<meta name="description" content="Meta description loses to JSON-LD.">
<script type="application/ld+json">
{"@context": "https://schema.org", "@graph": [
  {"@type": "WebSite", "name": "Acme Website"},
  {"@type": ["Dentist", "LocalBusiness"],
   "name": "Acme Dental LLC",
   "description": "Family dentistry since 2009.",
   "telephone": "+1-512-555-0100",
   "email": "mailto:hello@acmedental.test",
   "foundingDate": "2009",
   "founder": {"@type": "Person", "name": "Jane Doe"},
   "numberOfEmployees": {"@type": "QuantitativeValue", "value": 14},
   "address": {"@type": "PostalAddress", "streetAddress": "100 Main St",
               "addressLocality": "Austin", "addressRegion": "TX",
               "postalCode": "78701", "addressCountry": {"@type": "Country", "name": "US"}},
   "geo": {"@type": "GeoCoordinates", "latitude": "30.2672", "longitude": -97.7431},
   "sameAs": ["https://www.facebook.com/acmedental", "https://example.com/other"]}
]}
</script>
</head><body>
<a href="tel:+15125550199">Call</a>
<a href="https://instagram.com/acmedental/">Instagram</a>
<a href="https://www.youtube.com/">YouTube home</a>
</body></html>"#;

    #[test]
    fn extracts_json_ld_business() {
        let data = extract_source_data(JSON_LD_PAGE, &page_url());

        assert_eq!(data.name.as_deref(), Some("Acme Dental LLC"));
        assert_eq!(data.description.as_deref(), Some("Family dentistry since 2009."));
        assert_eq!(data.phone.as_deref(), Some("+1-512-555-0100"), "JSON-LD wins over tel:");
        assert_eq!(data.email.as_deref(), Some("hello@acmedental.test"));
        assert_eq!(data.industry.as_deref(), Some("dentist"));
        assert_eq!(data.founder.as_deref(), Some("Jane Doe"));
        assert_eq!(data.employee_count, Some(14));
        assert_eq!(data.address.city.as_deref(), Some("Austin"));
        assert_eq!(data.address.country.as_deref(), Some("US"));
        assert_eq!(data.address.postal_code.as_deref(), Some("78701"));

        let coords = data.coordinates.expect("coordinates");
        assert!((coords.latitude - 30.2672).abs() < 1e-9);

        assert_eq!(
            data.social.facebook.as_deref(),
            Some("https://www.facebook.com/acmedental")
        );
        assert_eq!(
            data.social.instagram.as_deref(),
            Some("https://instagram.com/acmedental/")
        );
        assert!(data.social.youtube.is_none(), "bare homepage is not a profile");
        assert_eq!(data.website.as_deref(), Some("https://www.acmedental.test/"));
    }

    #[test]
    fn falls_back_to_meta_and_links() {
        let html = r#"<html><head>
<title>Bright Smiles - Dentist in Round Rock</title>
<meta property="og:description" content="Gentle care.">
</head><body>
<a href="mailto:info@brightsmiles.test?subject=Hi">Email</a>
<a href="tel: 512-555-0111 ">Phone</a>
<a href="https://x.com/brightsmiles">X</a>
</body></html>"#;
        let data = extract_source_data(html, &page_url());

        assert_eq!(data.name.as_deref(), Some("Bright Smiles"));
        assert_eq!(data.description.as_deref(), Some("Gentle care."));
        assert_eq!(data.email.as_deref(), Some("info@brightsmiles.test"));
        assert_eq!(data.phone.as_deref(), Some("512-555-0111"));
        assert_eq!(data.social.twitter.as_deref(), Some("https://x.com/brightsmiles"));
        assert!(data.address.city.is_none());
    }

    #[test]
    fn og_site_name_beats_title() {
        let html = r#"<html><head><title>Home</title>
<meta property="og:site_name" content="Acme Dental"></head><body></body></html>"#;
        let data = extract_source_data(html, &page_url());
        assert_eq!(data.name.as_deref(), Some("Acme Dental"));
    }

    #[test]
    fn malformed_json_ld_is_ignored() {
        let html = r#"<html><head><title>Acme</title>
<script type="application/ld+json">{ not json</script></head></html>"#;
        let data = extract_source_data(html, &page_url());
        assert_eq!(data.name.as_deref(), Some("Acme"));
    }

    #[test]
    fn unknown_placeholders_dropped() {
        let html = r#"<html><head>
<script type="application/ld+json">
{"@type": "LocalBusiness", "name": "Acme", "address": {"addressLocality": "unknown", "addressRegion": "TX"}}
</script></head></html>"#;
        let data = extract_source_data(html, &page_url());
        assert!(data.address.city.is_none());
        assert_eq!(data.address.state.as_deref(), Some("TX"));
    }

    #[test]
    fn humanizes_schema_types() {
        assert_eq!(humanize_type("MedicalClinic"), "medical clinic");
        assert_eq!(humanize_type("Dentist"), "dentist");
    }
}
