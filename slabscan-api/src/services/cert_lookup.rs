//! Certificate-registry lookup
//!
//! Resolves a slab's certificate number against the issuing authority's
//! public record. One fetch-and-parse routine is parameterized by a small
//! per-company descriptor (URL builder + match pattern) selected from the
//! closed `GradingCompany` enumeration, so per-company behavior stays data,
//! not code branches.
//!
//! The lookup never errors: every fetch or parse failure degrades to an
//! unmatched result, with the source URL preserved for audit.

use once_cell::sync::Lazy;
use regex::Regex;
use slabscan_common::types::{CertLookupResult, GradingCompany};
use std::time::Duration;
use thiserror::Error;

use super::label_extractor;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "slabscan/0.1.0 (+https://github.com/slabscan/slabscan)";

/// Certificate lookup errors. Internal only: `lookup` converts every error
/// into an unmatched result.
#[derive(Debug, Error)]
pub enum CertLookupError {
    #[error("Network error: {0}")]
    Network(String),
}

static PSA_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)psa|cert\s*verification").expect("valid regex"));
static BGS_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)beckett|bgs|grading").expect("valid regex"));
static CGC_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)cgc|cert\s*lookup|grading").expect("valid regex"));

/// Per-company lookup behavior as data
struct ProviderDescriptor {
    company: GradingCompany,
    build_url: fn(&str) -> String,
    match_pattern: &'static Regex,
}

fn psa_url(cert_number: &str) -> String {
    format!(
        "https://www.psacard.com/cert/{}",
        urlencoding::encode(cert_number)
    )
}

fn bgs_url(cert_number: &str) -> String {
    format!(
        "https://www.beckett.com/grading/card-lookup?item_type=BGS&item_id={}",
        urlencoding::encode(cert_number)
    )
}

fn cgc_url(cert_number: &str) -> String {
    format!(
        "https://www.cgccards.com/certlookup/{}/",
        urlencoding::encode(cert_number)
    )
}

fn descriptor(company: GradingCompany) -> ProviderDescriptor {
    match company {
        GradingCompany::Psa => ProviderDescriptor {
            company: GradingCompany::Psa,
            build_url: psa_url,
            match_pattern: &PSA_MATCH,
        },
        GradingCompany::Bgs => ProviderDescriptor {
            company: GradingCompany::Bgs,
            build_url: bgs_url,
            match_pattern: &BGS_MATCH,
        },
        GradingCompany::Cgc => ProviderDescriptor {
            company: GradingCompany::Cgc,
            build_url: cgc_url,
            match_pattern: &CGC_MATCH,
        },
    }
}

/// Client for the three grading-authority public record endpoints
pub struct CertLookupClient {
    http_client: reqwest::Client,
}

impl CertLookupClient {
    pub fn new() -> Result<Self, CertLookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CertLookupError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }

    /// Look up a certificate number against the given company's registry.
    ///
    /// Missing/empty cert numbers short-circuit to unmatched. All failures
    /// degrade to unmatched rather than propagating.
    pub async fn lookup(
        &self,
        cert_number: Option<&str>,
        company: GradingCompany,
    ) -> CertLookupResult {
        let cert_number = match cert_number {
            Some(value) if !value.trim().is_empty() => value,
            _ => return CertLookupResult::unmatched(),
        };

        let provider = descriptor(company);
        let source_url = (provider.build_url)(cert_number);

        match self.fetch_and_parse(&source_url, &provider).await {
            Ok(result) => {
                tracing::debug!(
                    company = %company,
                    matched = result.matched,
                    source_url = %source_url,
                    "Certificate lookup complete"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    company = %company,
                    error = %e,
                    source_url = %source_url,
                    "Certificate lookup failed, treating as unmatched"
                );
                CertLookupResult::unmatched_at(source_url)
            }
        }
    }

    async fn fetch_and_parse(
        &self,
        source_url: &str,
        provider: &ProviderDescriptor,
    ) -> Result<CertLookupResult, CertLookupError> {
        let response = self
            .http_client
            .get(source_url)
            .send()
            .await
            .map_err(|e| CertLookupError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(CertLookupResult::unmatched_at(source_url));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CertLookupError::Network(e.to_string()))?;

        let fields = label_extractor::extract_fields(&html);
        let matched = provider.match_pattern.is_match(&fields.raw_label_text);

        Ok(CertLookupResult {
            matched,
            grading_company: matched.then_some(provider.company),
            grade_numeric: if matched { fields.grade_numeric } else { None },
            card: if matched {
                label_extractor::card_identity(&fields)
            } else {
                None
            },
            raw_label_text: Some(fields.raw_label_text),
            source_url: Some(source_url.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builds_company_urls() {
        assert_eq!(
            (descriptor(GradingCompany::Psa).build_url)("12345678"),
            "https://www.psacard.com/cert/12345678"
        );
        assert_eq!(
            (descriptor(GradingCompany::Bgs).build_url)("0001"),
            "https://www.beckett.com/grading/card-lookup?item_type=BGS&item_id=0001"
        );
        assert_eq!(
            (descriptor(GradingCompany::Cgc).build_url)("555"),
            "https://www.cgccards.com/certlookup/555/"
        );
    }

    #[test]
    fn descriptor_encodes_cert_number() {
        let url = (descriptor(GradingCompany::Psa).build_url)("12 34");
        assert_eq!(url, "https://www.psacard.com/cert/12%2034");
    }

    #[test]
    fn match_patterns_are_company_specific() {
        assert!(PSA_MATCH.is_match("PSA Cert Verification page"));
        assert!(!PSA_MATCH.is_match("some unrelated page"));
        assert!(BGS_MATCH.is_match("Beckett Grading Services"));
        assert!(CGC_MATCH.is_match("CGC cert lookup results"));
    }

    #[tokio::test]
    async fn missing_cert_number_short_circuits() {
        let client = CertLookupClient::new().unwrap();
        let result = client.lookup(None, GradingCompany::Psa).await;
        assert_eq!(result, CertLookupResult::unmatched());

        let result = client.lookup(Some("   "), GradingCompany::Bgs).await;
        assert_eq!(result, CertLookupResult::unmatched());
    }
}
