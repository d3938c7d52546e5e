/// Domain classification for auto-grouping
///
/// Maps a tab URL to the canonical name of the auto-group it belongs to.

/// Group name for URLs that cannot be classified (unparseable, no host).
pub const OTHER_GROUP: &str = "Other";

/// Group name for the browser's own pages (chrome:// and extension URLs).
pub const BROWSER_GROUP: &str = "Chrome";

/// Country-code TLDs that get three-label grouping (so "example.co.uk" is
/// one unit instead of "co.uk"). Not exhaustive; matches the host UI's list.
const COUNTRY_CODES: [&str; 12] = [
    "uk", "us", "ca", "au", "de", "fr", "jp", "cn", "ru", "br", "in", "il",
];

/// Derive the auto-group name for a URL.
///
/// Algorithm:
/// 1. Browser-internal schemes classify as [`BROWSER_GROUP`].
/// 2. Parse the URL; anything unparseable or hostless classifies as
///    [`OTHER_GROUP`]; classification never fails.
/// 3. IP hosts are returned verbatim.
/// 4. Strip a leading "www." label, split the host on ".":
///    - last label is a 2–3 char country code and ≥3 labels → last 3 labels
///    - ≥2 labels → last 2 labels
///    - else → whatever labels exist
///
/// Examples:
/// - https://mail.example.co.uk/x → example.co.uk
/// - https://www.github.com/foo → github.com
/// - chrome://settings → Chrome
/// - not a url → Other
pub fn auto_group_name(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return OTHER_GROUP.to_string();
    };

    if matches!(parsed.scheme(), "chrome" | "chrome-extension") {
        return BROWSER_GROUP.to_string();
    }

    match parsed.host() {
        Some(url::Host::Domain(host)) => group_name_for_host(host),
        // Grouping IP addresses by their trailing octets is nonsense.
        Some(ip) => ip.to_string(),
        None => OTHER_GROUP.to_string(),
    }
}

fn group_name_for_host(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();

    if labels.is_empty() || labels == [""] {
        return OTHER_GROUP.to_string();
    }

    let keep = if labels.len() >= 3 && has_country_code_tld(&labels) {
        3
    } else if labels.len() >= 2 {
        2
    } else {
        labels.len()
    };

    labels[labels.len() - keep..].join(".")
}

fn has_country_code_tld(labels: &[&str]) -> bool {
    let Some(tld) = labels.last() else {
        return false;
    };
    tld.len() <= 3 && COUNTRY_CODES.contains(&tld.to_lowercase().as_str())
}
