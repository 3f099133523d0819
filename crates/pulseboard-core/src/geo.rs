//! Country name normalization for map display.
//!
//! Every ISO 3166-1 country resolves by name, alpha-2 or alpha-3 code. A short
//! list of display names and typed spellings sits on top of the registry.

use std::borrow::Cow;

use rust_iso3166::CountryCode;

/// Display names that replace the registry's formal names, keyed by alpha-2.
static DISPLAY_NAMES: &[(&str, &str)] = &[
    ("BO", "Bolivia, Plurinational State of"),
    ("CZ", "Czechia"),
    ("GB", "United Kingdom"),
    ("IR", "Iran, Islamic Republic of"),
    ("KR", "Korea, Republic of"),
    ("MD", "Moldova, Republic of"),
    ("NL", "Netherlands"),
    ("RU", "Russian Federation"),
    ("TR", "Türkiye"),
    ("TW", "Taiwan, Province of China"),
    ("TZ", "Tanzania, United Republic of"),
    ("US", "United States"),
    ("VE", "Venezuela, Bolivarian Republic of"),
    ("VN", "Viet Nam"),
];

/// Lowercase spellings that are neither an ISO name nor a code.
static ALIASES: &[(&str, &str)] = &[
    ("america", "US"),
    ("brasil", "BR"),
    ("britain", "GB"),
    ("czech republic", "CZ"),
    ("deutschland", "DE"),
    ("eire", "IE"),
    ("england", "GB"),
    ("españa", "ES"),
    ("great britain", "GB"),
    ("holland", "NL"),
    ("iran", "IR"),
    ("italia", "IT"),
    ("korea", "KR"),
    ("méxico", "MX"),
    ("prc", "CN"),
    ("russia", "RU"),
    ("scotland", "GB"),
    ("south korea", "KR"),
    ("taiwan", "TW"),
    ("the netherlands", "NL"),
    ("the philippines", "PH"),
    ("turkey", "TR"),
    ("u.s.", "US"),
    ("u.s.a.", "US"),
    ("uae", "AE"),
    ("uk", "GB"),
    ("united states of america", "US"),
    ("vietnam", "VN"),
    ("wales", "GB"),
];

fn display_name(country: &CountryCode) -> &'static str {
    DISPLAY_NAMES
        .iter()
        .find(|(alpha2, _)| *alpha2 == country.alpha2)
        .map(|(_, name)| *name)
        .unwrap_or(country.name)
}

fn lookup(trimmed: &str) -> Option<CountryCode> {
    let lower = trimmed.to_lowercase();
    if let Some((_, alpha2)) = ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return rust_iso3166::from_alpha2(alpha2);
    }

    let upper = trimmed.to_uppercase();
    let by_code = match upper.len() {
        2 => rust_iso3166::from_alpha2(&upper),
        3 => rust_iso3166::from_alpha3(&upper),
        _ => None,
    };
    if by_code.is_some() {
        return by_code;
    }

    rust_iso3166::ALL.iter().copied().find(|c| {
        c.name.to_lowercase() == lower || display_name(c).to_lowercase() == lower
    })
}

/// Map a free-text country to its display name. Lookup is case-insensitive
/// over names, both ISO codes and known aliases; unknown values come back
/// trimmed.
pub fn official_country_name(raw: &str) -> Cow<'_, str> {
    let trimmed = raw.trim();
    match lookup(trimmed) {
        Some(country) => Cow::Borrowed(display_name(&country)),
        None => Cow::Borrowed(trimmed),
    }
}
