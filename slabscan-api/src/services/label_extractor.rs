//! Label text field extraction
//!
//! Parses unstructured label or listing text (HTML allowed) into structured
//! fields by pattern matching against known vocabularies. Extraction is
//! best-effort: unknown cards and sets yield `None`, which downstream
//! components treat as an expected degradation rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;
use slabscan_common::types::CardIdentity;

/// Sentinel set name used when a card resolved without a recognizable set
pub const UNKNOWN_SET: &str = "Unknown Set";

/// Half-point grade values 1.0-10.0 as a regex alternation
const HALF_POINT_GRADES: &str =
    r"10|9(?:\.5)?|8(?:\.5)?|7(?:\.5)?|6(?:\.5)?|5(?:\.5)?|4(?:\.5)?|3(?:\.5)?|2(?:\.5)?|1(?:\.5)?";

static SCRIPT_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static LABELED_GRADE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:grade|final\s*grade|assessment)\s*[:#-]?\s*({HALF_POINT_GRADES})"
    ))
    .expect("valid regex")
});
static BARE_GRADE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({HALF_POINT_GRADES})\s*(?:gem\s*mint|near\s*mint|mint|nm|mt)?\b"
    ))
    .expect("valid regex")
});

static SLASH_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\s*/\s*\d{1,3}\b").expect("valid regex"));
static HASH_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:card\s*#|#)\s*([A-Z0-9-]{1,12})").expect("valid regex"));

/// Fixed vocabulary of recognizable card names. Extendable, deliberately
/// not exhaustive.
const KNOWN_CARD_NAMES: &[&str] = &[
    "Charizard",
    "Blastoise",
    "Venusaur",
    "Pikachu",
    "Mew",
    "Mewtwo",
    "Lugia",
    "Gengar",
    "Umbreon",
    "Rayquaza",
];

/// Fixed vocabulary of recognizable set names
const KNOWN_SET_NAMES: &[&str] = &[
    "Base Set",
    "Jungle",
    "Fossil",
    "Team Rocket",
    "Neo Genesis",
    "Skyridge",
    "Evolving Skies",
];

/// Structured fields extracted from raw label/listing text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelFields {
    /// Canonical plain text: scripts and tags stripped, whitespace collapsed
    pub raw_label_text: String,
    pub grade_numeric: Option<f64>,
    pub card_number: Option<String>,
    pub card_name: Option<String>,
    pub set_name: Option<String>,
}

/// Extract structured fields from raw HTML or plain text
pub fn extract_fields(input: &str) -> LabelFields {
    let text = normalize_text(input);
    LabelFields {
        grade_numeric: parse_grade(&text),
        card_number: parse_card_number(&text),
        card_name: find_known(&text, KNOWN_CARD_NAMES),
        set_name: find_known(&text, KNOWN_SET_NAMES),
        raw_label_text: text,
    }
}

/// Build a card identity from extracted fields. Requires both name and
/// number; the set name falls back to [`UNKNOWN_SET`].
pub fn card_identity(fields: &LabelFields) -> Option<CardIdentity> {
    let name = fields.card_name.as_ref()?;
    let card_number = fields.card_number.as_ref()?;
    Some(CardIdentity::new(
        name.clone(),
        fields
            .set_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_SET.to_string()),
        card_number.clone(),
    ))
}

fn normalize_text(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK_RE.replace_all(input, " ");
    let without_tags = TAG_RE.replace_all(&without_scripts, " ");
    WHITESPACE_RE
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Explicit-label pattern first, then a bare half-point token optionally
/// followed by a condition word. First successful pattern wins.
fn parse_grade(text: &str) -> Option<f64> {
    for pattern in [&*LABELED_GRADE_RE, &*BARE_GRADE_RE] {
        if let Some(captures) = pattern.captures(text) {
            if let Some(value) = captures.get(1) {
                if let Ok(grade) = value.as_str().parse::<f64>() {
                    return Some(grade);
                }
            }
        }
    }
    None
}

/// "N/total" preferred; else a "#"-prefixed alphanumeric token, uppercased
fn parse_card_number(text: &str) -> Option<String> {
    if let Some(found) = SLASH_NUMBER_RE.find(text) {
        return Some(WHITESPACE_RE.replace_all(found.as_str(), "").into_owned());
    }
    HASH_NUMBER_RE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_uppercase())
}

fn find_known(text: &str, vocabulary: &[&str]) -> Option<String> {
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .find(|candidate| lower.contains(&candidate.to_lowercase()))
        .map(|candidate| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_tags_and_collapses_whitespace() {
        let html = "<html><script>var x = 1;</script><body><h1>PSA  Cert</h1>\n<p>Charizard</p></body></html>";
        let fields = extract_fields(html);
        assert_eq!(fields.raw_label_text, "PSA Cert Charizard");
    }

    #[test]
    fn labeled_grade_wins_over_bare_token() {
        let fields = extract_fields("Card 8 in collection. Final Grade: 9.5 GEM MINT");
        assert_eq!(fields.grade_numeric, Some(9.5));
    }

    #[test]
    fn bare_grade_with_condition_word() {
        let fields = extract_fields("Charizard 10 GEM MINT holo");
        assert_eq!(fields.grade_numeric, Some(10.0));
    }

    #[test]
    fn no_grade_when_no_numeric_token() {
        let fields = extract_fields("beautiful vintage holo card");
        assert_eq!(fields.grade_numeric, None);
    }

    #[test]
    fn slash_number_strips_internal_whitespace() {
        let fields = extract_fields("Blastoise 2 / 102 Base Set");
        assert_eq!(fields.card_number.as_deref(), Some("2/102"));
    }

    #[test]
    fn hash_number_is_uppercased() {
        let fields = extract_fields("promo card #swsh-039 near mint");
        assert_eq!(fields.card_number.as_deref(), Some("SWSH-039"));
    }

    #[test]
    fn known_name_and_set_match_case_insensitively() {
        let fields = extract_fields("PSA 9 CHARIZARD base set holo");
        assert_eq!(fields.card_name.as_deref(), Some("Charizard"));
        assert_eq!(fields.set_name.as_deref(), Some("Base Set"));
    }

    #[test]
    fn unknown_card_yields_none() {
        let fields = extract_fields("Some Card Nobody Knows 33/100");
        assert_eq!(fields.card_name, None);
    }

    #[test]
    fn identity_requires_name_and_number() {
        let without_number = extract_fields("Charizard GEM MINT");
        assert_eq!(card_identity(&without_number), None);

        let complete = extract_fields("Charizard 4/102 Base Set");
        let identity = card_identity(&complete).unwrap();
        assert_eq!(identity.name, "Charizard");
        assert_eq!(identity.card_number, "4/102");
        assert_eq!(identity.set_name, "Base Set");
    }

    #[test]
    fn identity_defaults_to_unknown_set() {
        let fields = extract_fields("Umbreon 32/75 holo rare");
        let identity = card_identity(&fields).unwrap();
        assert_eq!(identity.set_name, UNKNOWN_SET);
    }
}
