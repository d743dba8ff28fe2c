//! Subject-name normalization and search query construction.

use std::sync::LazyLock;

use entitygraph_shared::Location;
use regex::Regex;

/// Trailing numeric run of 6+ digits appended by upstream test/generation systems.
static NUMERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\d{6,}$").expect("valid numeric-suffix regex"));

static CORPORATE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[\s,]+(incorporated|inc|l\.l\.c|llc|limited|ltd|corporation|corp|company|co|pllc|llp|pc)\.?$",
    )
    .expect("valid corporate-suffix regex")
});

/// Strip disambiguation digits, spaced or not: `"Example Clinic 1763324055284"`
/// and `"Clinic1763324055284"` lose the suffix. A name that is only digits is
/// kept as is.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = NUMERIC_SUFFIX.replace(trimmed, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        trimmed.to_string()
    } else {
        stripped.to_string()
    }
}

/// Remove trailing corporate suffixes (`Inc`, `LLC`, `Co.`, ...), repeatedly,
/// so `"Acme Co., Inc."` becomes `"Acme"`. Never strips the name to nothing.
pub fn delegalize(name: &str) -> String {
    let mut current = name.trim().to_string();
    loop {
        let stripped = CORPORATE_SUFFIX.replace(&current, "").trim().to_string();
        if stripped.is_empty() || stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Queries issued for one assessment, in order.
pub fn build_queries(name: &str, location: Option<&Location>) -> Vec<String> {
    let suffix = location.map(Location::query_suffix).unwrap_or_default();
    let located = |n: &str| format!("\"{n}\" {suffix}").trim().to_string();

    let mut queries = vec![located(name)];

    let delegalized = delegalize(name);
    if delegalized != name {
        queries.push(located(&delegalized));
    }

    queries.push(format!("\"{name}\" (site:.gov OR site:.edu)"));
    queries
}

/// Deduplication key for a reference URL: fragment removed, trailing `/` trimmed.
pub fn dedup_key(raw: &str) -> String {
    let without_fragment = match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or(raw).to_string(),
    };
    without_fragment.trim_end_matches('/').to_string()
}

/// Lowercase alphanumerics only, used to spot company-owned domains.
pub fn compact_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
