//! Visual identity resolution
//!
//! Produces a best-guess card identity, grading company, numeric grade,
//! optional certificate number, and confidence score from a scan image.
//!
//! The resolver seam is a capability trait with two implementations:
//! `ModelBackedResolver` calls the vision provider, and
//! `DeterministicFallbackResolver` derives a seeded demo identity from the
//! image bytes. `WithFallback` composes them, converting every model-path
//! error into the offline fallback, so the composed resolver never fails.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use slabscan_common::config::VisionConfig;
use slabscan_common::types::{CardIdentity, GradingCompany, ResolvedIdentity};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of payload bytes hashed into the offline seed
const SEED_PREFIX_LEN: usize = 120;

/// Grades the offline resolver cycles through
const FALLBACK_GRADES: [f64; 3] = [8.0, 9.0, 10.0];

const IDENTIFY_INSTRUCTION: &str = "You are identifying a graded Pokemon card slab from a single \
image. Return strict JSON with keys: cardName, setName, cardNumber, gradingCompany, gradeNumeric, \
certNumber, confidence, alternatives, rawLabelText. alternatives should be up to 2 objects with \
cardName, setName, cardNumber. confidence is 0.0-1.0.";

/// Demo catalog backing the deterministic offline identity
static DEMO_CATALOG: Lazy<Vec<CardIdentity>> = Lazy::new(|| {
    vec![
        CardIdentity::new("Charizard", "Base Set", "4/102"),
        CardIdentity::new("Blastoise", "Base Set", "2/102"),
        CardIdentity::new("Venusaur", "Base Set", "15/102"),
    ]
});

/// Vision resolver errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Vision model returned no output text")]
    EmptyOutput,
}

/// Capability seam for identity resolution from an image payload
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        image_base64: &str,
        hint: Option<GradingCompany>,
    ) -> Result<ResolvedIdentity, VisionError>;
}

/// Normalize a free-text grading-company string to the closed enumeration.
/// Substring match; PSA is the default.
pub fn normalize_company(input: Option<&str>) -> GradingCompany {
    let value = input.unwrap_or_default().to_uppercase();
    if value.contains("BGS") || value.contains("BECKETT") {
        GradingCompany::Bgs
    } else if value.contains("CGC") {
        GradingCompany::Cgc
    } else {
        GradingCompany::Psa
    }
}

fn seed_from_payload(image_base64: &str) -> u64 {
    let bytes = image_base64.as_bytes();
    let prefix = &bytes[..bytes.len().min(SEED_PREFIX_LEN)];
    let digest = Sha256::digest(prefix);
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(seed_bytes)
}

/// Deterministic offline identity: same payload bytes always map to the
/// same catalog card, grade, and confidence. Never errors.
pub fn fallback_identity(image_base64: &str, hint: Option<GradingCompany>) -> ResolvedIdentity {
    let seed = seed_from_payload(image_base64);
    let index = (seed % DEMO_CATALOG.len() as u64) as usize;
    let card = DEMO_CATALOG[index].clone();
    let grade_numeric = FALLBACK_GRADES[(seed % FALLBACK_GRADES.len() as u64) as usize];
    let confidence = (0.72 + (seed % 20) as f64 / 100.0).min(0.92);

    let alternatives: Vec<CardIdentity> = DEMO_CATALOG
        .iter()
        .filter(|candidate| candidate.card_number != card.card_number)
        .take(2)
        .cloned()
        .collect();

    ResolvedIdentity {
        card,
        grading_company: hint.unwrap_or(GradingCompany::Psa),
        grade_numeric,
        cert_number: None,
        confidence,
        alternatives,
        raw_label_text: String::new(),
    }
}

/// Offline resolver used when no vision credential is configured
pub struct DeterministicFallbackResolver;

#[async_trait]
impl IdentityResolver for DeterministicFallbackResolver {
    async fn resolve(
        &self,
        image_base64: &str,
        hint: Option<GradingCompany>,
    ) -> Result<ResolvedIdentity, VisionError> {
        Ok(fallback_identity(image_base64, hint))
    }
}

/// Decorator that delegates to the offline fallback on any inner error
pub struct WithFallback<R> {
    inner: R,
}

impl<R> WithFallback<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: IdentityResolver> IdentityResolver for WithFallback<R> {
    async fn resolve(
        &self,
        image_base64: &str,
        hint: Option<GradingCompany>,
    ) -> Result<ResolvedIdentity, VisionError> {
        match self.inner.resolve(image_base64, hint).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Vision resolver failed, using offline fallback");
                Ok(fallback_identity(image_base64, hint))
            }
        }
    }
}

/// Fields the vision model is instructed to return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelIdentity {
    card_name: String,
    set_name: String,
    card_number: String,
    grading_company: Option<String>,
    grade_numeric: Option<f64>,
    cert_number: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    alternatives: Vec<ModelAlternative>,
    raw_label_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelAlternative {
    card_name: String,
    set_name: String,
    card_number: String,
}

/// Subset of the vision provider's response envelope we read
#[derive(Debug, Deserialize)]
struct ProviderReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ProviderOutputItem>,
}

#[derive(Debug, Deserialize)]
struct ProviderOutputItem {
    #[serde(default)]
    content: Vec<ProviderOutputContent>,
}

#[derive(Debug, Deserialize)]
struct ProviderOutputContent {
    #[serde(default)]
    text: String,
}

fn reply_text(reply: ProviderReply) -> Option<String> {
    if let Some(text) = reply.output_text {
        if !text.is_empty() {
            return Some(text);
        }
    }
    reply
        .output
        .into_iter()
        .flat_map(|item| item.content)
        .map(|content| content.text)
        .find(|text| !text.is_empty())
}

/// Post-validate model output into a well-formed identity. Grade is clamped
/// to [1, 10] and snapped to half-point steps; confidence clamped to
/// [0.01, 0.99]; alternatives capped at 2; a caller-supplied company hint
/// is authoritative.
fn identity_from_model(parsed: ModelIdentity, hint: Option<GradingCompany>) -> ResolvedIdentity {
    let grade_numeric = snap_half_point(parsed.grade_numeric.unwrap_or(9.0).clamp(1.0, 10.0));
    let confidence = parsed.confidence.unwrap_or(0.7).clamp(0.01, 0.99);
    let grading_company =
        hint.unwrap_or_else(|| normalize_company(parsed.grading_company.as_deref()));

    let alternatives: Vec<CardIdentity> = parsed
        .alternatives
        .into_iter()
        .take(2)
        .map(|alt| CardIdentity::new(alt.card_name, alt.set_name, alt.card_number))
        .collect();

    ResolvedIdentity {
        card: CardIdentity::new(parsed.card_name, parsed.set_name, parsed.card_number),
        grading_company,
        grade_numeric,
        cert_number: parsed.cert_number.filter(|value| !value.trim().is_empty()),
        confidence,
        alternatives,
        raw_label_text: parsed.raw_label_text.unwrap_or_default(),
    }
}

fn snap_half_point(grade: f64) -> f64 {
    (grade * 2.0).round() / 2.0
}

/// Resolver backed by the configured vision provider
pub struct ModelBackedResolver {
    http_client: reqwest::Client,
    config: VisionConfig,
}

impl ModelBackedResolver {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VisionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl IdentityResolver for ModelBackedResolver {
    async fn resolve(
        &self,
        image_base64: &str,
        hint: Option<GradingCompany>,
    ) -> Result<ResolvedIdentity, VisionError> {
        let url = format!("{}/v1/responses", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": IDENTIFY_INSTRUCTION },
                    {
                        "type": "input_image",
                        "image_url": format!("data:image/jpeg;base64,{image_base64}"),
                        "detail": "auto"
                    }
                ]
            }]
        });

        tracing::debug!(model = %self.config.model, "Querying vision provider");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::Api(status.as_u16(), error_text));
        }

        let reply: ProviderReply = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let output_text = reply_text(reply).ok_or(VisionError::EmptyOutput)?;
        let parsed: ModelIdentity = serde_json::from_str(&output_text)
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let identity = identity_from_model(parsed, hint);
        tracing::info!(
            card = %identity.card.name,
            grade = identity.grade_numeric,
            confidence = identity.confidence,
            "Vision identification complete"
        );

        Ok(identity)
    }
}

/// Build the resolver for the configured credential state: model-backed
/// with offline fallback when a credential is present, pure offline
/// otherwise.
pub fn resolver_from_config(
    vision: Option<VisionConfig>,
) -> Result<std::sync::Arc<dyn IdentityResolver>, VisionError> {
    match vision {
        Some(config) => {
            let inner = ModelBackedResolver::new(config)?;
            Ok(std::sync::Arc::new(WithFallback::new(inner)))
        }
        None => {
            tracing::info!("No vision credential configured, using deterministic offline resolver");
            Ok(std::sync::Arc::new(DeterministicFallbackResolver))
        }
    }
}
