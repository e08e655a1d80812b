//! Domain types shared across slabscan services
//!
//! Wire-facing types serialize as camelCase to match the mobile client
//! contract. `ResolvedIdentity` is produced once per scan and then refined
//! in place by certificate corroboration; `Valuation` is immutable once
//! computed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A best-effort card label, not a catalog key. No uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIdentity {
    /// Card name, e.g. "Charizard"
    pub name: String,
    /// Set name, e.g. "Base Set"; "Unknown Set" when unresolved
    pub set_name: String,
    /// Preferably "N/total" format, e.g. "4/102"
    pub card_number: String,
}

impl CardIdentity {
    pub fn new(
        name: impl Into<String>,
        set_name: impl Into<String>,
        card_number: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            set_name: set_name.into(),
            card_number: card_number.into(),
        }
    }
}

/// Closed enumeration of supported grading authorities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradingCompany {
    #[serde(rename = "PSA")]
    Psa,
    #[serde(rename = "BGS")]
    Bgs,
    #[serde(rename = "CGC")]
    Cgc,
}

impl GradingCompany {
    pub const ALL: [GradingCompany; 3] =
        [GradingCompany::Psa, GradingCompany::Bgs, GradingCompany::Cgc];

    pub fn as_str(&self) -> &'static str {
        match self {
            GradingCompany::Psa => "PSA",
            GradingCompany::Bgs => "BGS",
            GradingCompany::Cgc => "CGC",
        }
    }
}

impl fmt::Display for GradingCompany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a scanned slab as resolved by the vision pipeline,
/// optionally refined by certificate corroboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    pub card: CardIdentity,
    pub grading_company: GradingCompany,
    /// 1.0-10.0 in half-point steps
    pub grade_numeric: f64,
    pub cert_number: Option<String>,
    /// 0.0-1.0; only ever increased by certificate corroboration
    pub confidence: f64,
    /// Up to 2 runner-up candidates, best first
    pub alternatives: Vec<CardIdentity>,
    #[serde(default)]
    pub raw_label_text: String,
}

/// Outcome of a certificate-registry lookup. Transient: only its
/// corroboration feeds into `ResolvedIdentity`, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertLookupResult {
    pub matched: bool,
    pub card: Option<CardIdentity>,
    pub grading_company: Option<GradingCompany>,
    pub grade_numeric: Option<f64>,
    pub raw_label_text: Option<String>,
    /// Preserved even on failed lookups, for audit/debug
    pub source_url: Option<String>,
}

impl CertLookupResult {
    /// An unmatched result with no source URL (e.g. no cert number supplied)
    pub fn unmatched() -> Self {
        Self::default()
    }

    /// An unmatched result that still records where the lookup went
    pub fn unmatched_at(source_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
            ..Self::default()
        }
    }
}

/// One observed completed marketplace transaction. Ephemeral: fetched per
/// valuation request, never cached across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldComp {
    pub title: String,
    pub price: f64,
    pub sold_at: DateTime<Utc>,
}

/// Fair-value band derived from comps (or the heuristic fallback).
/// Invariant: `range_low <= fair_market_value <= range_high`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    /// Always "USD"; no currency conversion
    pub currency: String,
    pub fair_market_value: i64,
    pub range_low: i64,
    pub range_high: i64,
    /// Number of comps the band was computed from; 0 for the heuristic
    pub sample_size: usize,
    /// Fixed reporting window, not a computed statistic
    pub window_days: u32,
}

/// Scan lifecycle: created as `Analyzed`, flipped to `Confirmed` by the
/// confirm operation. Never deleted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Analyzed,
    Confirmed,
}

/// Persisted result of one analyze request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub scan_id: Uuid,
    pub identity: ResolvedIdentity,
    pub valuation: Valuation,
    pub needs_user_confirmation: bool,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_company_serializes_uppercase() {
        let json = serde_json::to_string(&GradingCompany::Bgs).unwrap();
        assert_eq!(json, "\"BGS\"");

        let parsed: GradingCompany = serde_json::from_str("\"CGC\"").unwrap();
        assert_eq!(parsed, GradingCompany::Cgc);
    }

    #[test]
    fn scan_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ScanStatus::Analyzed).unwrap(),
            "\"analyzed\""
        );
        assert_eq!(
            serde_json::to_string(&ScanStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn resolved_identity_uses_camel_case_wire_names() {
        let identity = ResolvedIdentity {
            card: CardIdentity::new("Charizard", "Base Set", "4/102"),
            grading_company: GradingCompany::Psa,
            grade_numeric: 10.0,
            cert_number: None,
            confidence: 0.9,
            alternatives: vec![],
            raw_label_text: String::new(),
        };

        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("gradeNumeric").is_some());
        assert!(value.get("certNumber").is_some());
        assert_eq!(value["card"]["cardNumber"], "4/102");
    }
}
