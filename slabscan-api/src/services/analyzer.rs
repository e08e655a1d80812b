//! Scan analysis orchestration
//!
//! Runs the per-scan pipeline: resolve identity from the image, corroborate
//! against the grading authority's certificate record, value the final
//! identity against market comps, and decide whether the result needs user
//! confirmation. Each stage either succeeds or degrades through its own
//! fallback; no retries across stages.

use serde::Serialize;
use slabscan_common::types::{CertLookupResult, GradingCompany, ResolvedIdentity, Valuation};
use std::sync::Arc;

use super::cert_lookup::CertLookupClient;
use super::market_comps::MarketCompsClient;
use super::vision::{fallback_identity, IdentityResolver};

/// Results below this confidence are flagged for user confirmation
pub const CONFIRMATION_THRESHOLD: f64 = 0.82;

/// Flat confidence boost applied when the certificate record corroborates
const CERT_MATCH_CONFIDENCE_BOOST: f64 = 0.10;

const CONFIDENCE_CEILING: f64 = 0.99;

/// Output of one analyze pass, before persistence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub identity: ResolvedIdentity,
    pub valuation: Valuation,
    pub needs_user_confirmation: bool,
}

/// Whether a final confidence requires user confirmation (strictly below
/// the threshold)
pub fn needs_confirmation(confidence: f64) -> bool {
    confidence < CONFIRMATION_THRESHOLD
}

/// Overlay a matched certificate record onto the visual identity. The
/// certificate authority is more authoritative than the vision guess, and
/// corroboration only ever raises confidence.
pub fn apply_cert_match(identity: &mut ResolvedIdentity, lookup: &CertLookupResult) {
    if let Some(card) = &lookup.card {
        identity.card = card.clone();
    }
    if let Some(company) = lookup.grading_company {
        identity.grading_company = company;
    }
    if let Some(grade) = lookup.grade_numeric {
        identity.grade_numeric = grade;
    }
    identity.confidence = (identity.confidence + CERT_MATCH_CONFIDENCE_BOOST).min(CONFIDENCE_CEILING);
}

/// Per-scan orchestrator owning the provider clients
pub struct ScanAnalyzer {
    resolver: Arc<dyn IdentityResolver>,
    cert_client: CertLookupClient,
    comps_client: MarketCompsClient,
}

impl ScanAnalyzer {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        cert_client: CertLookupClient,
        comps_client: MarketCompsClient,
    ) -> Self {
        Self {
            resolver,
            cert_client,
            comps_client,
        }
    }

    /// Analyze one scan image. Always returns a well-formed outcome: every
    /// provider failure is absorbed by that provider's fallback.
    pub async fn analyze(
        &self,
        image_base64: &str,
        hint: Option<GradingCompany>,
    ) -> AnalysisOutcome {
        let mut identity = match self.resolver.resolve(image_base64, hint).await {
            Ok(identity) => identity,
            // unreachable with the composed resolver, but the seam allows it
            Err(e) => {
                tracing::warn!(error = %e, "Identity resolver errored, using offline fallback");
                fallback_identity(image_base64, hint)
            }
        };
        tracing::debug!(
            stage = "identity_resolved",
            card = %identity.card.name,
            card_number = %identity.card.card_number,
            confidence = identity.confidence,
            "Resolved scan identity"
        );

        if let Some(cert_number) = identity.cert_number.clone() {
            let lookup = self
                .cert_client
                .lookup(Some(&cert_number), identity.grading_company)
                .await;
            tracing::debug!(
                stage = "cert_checked",
                matched = lookup.matched,
                "Certificate corroboration complete"
            );
            if lookup.matched {
                apply_cert_match(&mut identity, &lookup);
            }
        }

        let valuation = self
            .comps_client
            .valuation_for(
                &identity.card,
                identity.grade_numeric,
                identity.grading_company,
            )
            .await;
        tracing::debug!(
            stage = "valued",
            fair_market_value = valuation.fair_market_value,
            sample_size = valuation.sample_size,
            "Valuation complete"
        );

        let needs_user_confirmation = needs_confirmation(identity.confidence);
        AnalysisOutcome {
            identity,
            valuation,
            needs_user_confirmation,
        }
    }
}
