//! Market comp aggregation
//!
//! Turns a resolved card identity into a fair-value band from completed
//! marketplace listings: search, authenticity/condition blocklisting,
//! relevance matching against the identity, IQR outlier rejection, and a
//! recency-weighted percentile band. When the marketplace is unavailable or
//! no usable comps survive filtering, a deterministic heuristic valuation
//! takes over, so `valuation_for` never fails.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use slabscan_common::config::MarketplaceConfig;
use slabscan_common::types::{CardIdentity, GradingCompany, SoldComp, Valuation};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
const FINDING_URL: &str = "https://svcs.ebay.com/services/search/FindingService/v1";
const OAUTH_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Reported in every valuation regardless of actual comp date spread.
/// A fixed reporting window, not a computed statistic.
const REPORTING_WINDOW_DAYS: u32 = 90;

/// Tokens this close to expiry are refreshed rather than reused
const TOKEN_EXPIRY_SLACK_SECS: i64 = 30;

/// Exponential decay constant for comp age weighting, in days
const RECENCY_DECAY_DAYS: f64 = 45.0;

/// Quartile statistics need at least this many prices
const MIN_SAMPLE_FOR_OUTLIER_REJECTION: usize = 6;

const MAX_RESULTS_PER_QUERY: &str = "100";

/// Red-flag title patterns: reprints/proxies, bulk lots, and
/// condition/grading disqualifiers. "raw" is known to also hit phrases
/// like "raw edge wear"; the false positive only shrinks the sample.
static BLOCKLIST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\breprint\b",
        r"(?i)\bproxy\b",
        r"(?i)\bproxies\b",
        r"(?i)\bcustom\b",
        r"(?i)\bfan\s*art\b",
        r"(?i)\borica\b",
        r"(?i)\bworld\s*championship\b",
        r"(?i)\bcelebration\s*proxy\b",
        r"(?i)\blot\s*of\b",
        r"(?i)\blot\b",
        r"(?i)\bset\s*of\b",
        r"(?i)\bpack\s*fresh\b",
        r"(?i)\bdamaged\b",
        r"(?i)\bcreased\b",
        r"(?i)\bpoor\b",
        r"(?i)\bplayed\b",
        r"(?i)\bproxy\s*card\b",
        r"(?i)\bnot\s*graded\b",
        r"(?i)\braw\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

static NON_TOKEN_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9/]+").expect("valid regex"));

/// Marketplace client errors. Internal only: `valuation_for` converts every
/// error into the heuristic fallback.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Marketplace API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Marketplace credentials not configured")]
    NotConfigured,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

// The Finding API wraps every field in a single-element array.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingResponse {
    #[serde(default)]
    find_completed_items_response: Vec<CompletedItemsResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedItemsResponse {
    #[serde(default)]
    search_result: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    item: Vec<ListingItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    selling_status: Vec<SellingStatus>,
    #[serde(default)]
    listing_info: Vec<ListingInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SellingStatus {
    #[serde(default)]
    current_price: Vec<CurrentPrice>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentPrice {
    #[serde(rename = "__value__")]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingInfo {
    #[serde(default)]
    end_time: Vec<String>,
}

/// Marketplace search client with an in-process OAuth token cache
pub struct MarketCompsClient {
    http_client: reqwest::Client,
    credentials: Option<MarketplaceConfig>,
    /// Held across refresh so racing requests do not fetch duplicate tokens
    token_cache: Mutex<Option<CachedToken>>,
}

impl MarketCompsClient {
    pub fn new(credentials: Option<MarketplaceConfig>) -> Result<Self, MarketError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MarketError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
            token_cache: Mutex::new(None),
        })
    }

    /// Compute a valuation for the identity. Falls back to the heuristic
    /// band on any marketplace failure or an empty filtered sample.
    pub async fn valuation_for(
        &self,
        card: &CardIdentity,
        grade_numeric: f64,
        grading_company: GradingCompany,
    ) -> Valuation {
        let query = build_query(card, grade_numeric, grading_company);

        match self
            .market_valuation(&query, card, grade_numeric, grading_company)
            .await
        {
            Ok(Some(valuation)) => valuation,
            Ok(None) => {
                tracing::info!(query = %query, "No usable comps after filtering, using heuristic valuation");
                fallback_valuation(card, grade_numeric, grading_company)
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Marketplace lookup failed, using heuristic valuation");
                fallback_valuation(card, grade_numeric, grading_company)
            }
        }
    }

    async fn market_valuation(
        &self,
        query: &str,
        card: &CardIdentity,
        grade_numeric: f64,
        grading_company: GradingCompany,
    ) -> Result<Option<Valuation>, MarketError> {
        let raw_comps = self.fetch_sold_comps(query).await?;
        let total_fetched = raw_comps.len();

        let comps: Vec<SoldComp> = raw_comps
            .into_iter()
            .filter(|comp| !is_blocklisted(&comp.title))
            .filter(|comp| {
                listing_matches_identity(&comp.title, card, grade_numeric, grading_company)
            })
            .collect();

        tracing::debug!(
            fetched = total_fetched,
            relevant = comps.len(),
            "Filtered sold comps"
        );

        if comps.is_empty() {
            return Ok(None);
        }

        let band = weighted_band(&comps, Utc::now());
        Ok(Some(Valuation {
            currency: "USD".to_string(),
            fair_market_value: band.mid,
            range_low: band.low,
            range_high: band.high,
            sample_size: comps.len(),
            window_days: REPORTING_WINDOW_DAYS,
        }))
    }

    /// Bearer token for the search API, refreshed when expired or within
    /// 30 seconds of expiry. The cache mutex is held across the refresh so
    /// concurrent requests racing past expiry trigger a single fetch.
    async fn access_token(&self) -> Result<String, MarketError> {
        let credentials = self.credentials.as_ref().ok_or(MarketError::NotConfigured)?;

        let mut cache = self.token_cache.lock().await;
        if let Some(token) = cache.as_ref() {
            let slack = ChronoDuration::seconds(TOKEN_EXPIRY_SLACK_SECS);
            if token.expires_at > Utc::now() + slack {
                return Ok(token.value.clone());
            }
        }

        let basic = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let params = [
            ("grant_type", "client_credentials"),
            ("scope", OAUTH_SCOPE),
        ];

        let response = self
            .http_client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {basic}"))
            .form(&params)
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketError::Api(status.as_u16(), error_text));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        tracing::debug!(expires_in = payload.expires_in, "Refreshed marketplace token");

        *cache = Some(CachedToken {
            value: payload.access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(payload.expires_in),
        });

        Ok(payload.access_token)
    }

    async fn fetch_sold_comps(&self, query: &str) -> Result<Vec<SoldComp>, MarketError> {
        let token = self.access_token().await?;
        let credentials = self.credentials.as_ref().ok_or(MarketError::NotConfigured)?;

        let response = self
            .http_client
            .get(FINDING_URL)
            .query(&[
                ("OPERATION-NAME", "findCompletedItems"),
                ("SERVICE-VERSION", "1.13.0"),
                ("RESPONSE-DATA-FORMAT", "JSON"),
                ("REST-PAYLOAD", ""),
                ("keywords", query),
                ("itemFilter(0).name", "SoldItemsOnly"),
                ("itemFilter(0).value", "true"),
                ("itemFilter(1).name", "LocatedIn"),
                ("itemFilter(1).value", "US"),
                ("paginationInput.entriesPerPage", MAX_RESULTS_PER_QUERY),
            ])
            .header("X-EBAY-SOA-SECURITY-APPNAME", &credentials.client_id)
            .header("X-EBAY-SOA-GLOBAL-ID", &credentials.marketplace_id)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketError::Api(status.as_u16(), error_text));
        }

        let payload: FindingResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        Ok(flatten_listings(payload))
    }
}

/// Rows with a missing or unparseable title, price, or end time are skipped
fn flatten_listings(payload: FindingResponse) -> Vec<SoldComp> {
    payload
        .find_completed_items_response
        .into_iter()
        .flat_map(|response| response.search_result)
        .flat_map(|result| result.item)
        .filter_map(|item| {
            let title = item.title.into_iter().next()?;
            let price = item
                .selling_status
                .into_iter()
                .next()?
                .current_price
                .into_iter()
                .next()?
                .value?
                .parse::<f64>()
                .ok()?;
            let sold_at = item
                .listing_info
                .into_iter()
                .next()?
                .end_time
                .into_iter()
                .next()
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())?
                .with_timezone(&Utc);

            if title.is_empty() {
                return None;
            }
            Some(SoldComp {
                title,
                price,
                sold_at,
            })
        })
        .collect()
}

/// Search keywords with explicit negative terms excluding reprints,
/// proxies, and bulk lots
pub fn build_query(card: &CardIdentity, grade_numeric: f64, company: GradingCompany) -> String {
    format!(
        "{} {} {} {} {} -reprint -proxy -lot",
        card.name,
        card.card_number,
        card.set_name,
        company,
        format_grade(grade_numeric)
    )
}

/// "9" for whole grades, "9.5" for half grades
fn format_grade(grade_numeric: f64) -> String {
    if grade_numeric.fract() == 0.0 {
        format!("{}", grade_numeric as i64)
    } else {
        format!("{grade_numeric}")
    }
}

/// Reject titles with authenticity or condition red flags
pub fn is_blocklisted(title: &str) -> bool {
    BLOCKLIST_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(title))
}

/// Lowercase, strip non-alphanumeric (keeping `/`), collapse to single
/// spaces, trim
pub fn normalize_token(input: &str) -> String {
    NON_TOKEN_CHARS_RE
        .replace_all(&input.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Token variants a listing title may use for a numeric grade, normalized.
/// Covers "9.5" and spoken-style "9 5" as well as "grade 9" forms.
pub fn grade_tokens(grade_numeric: f64) -> Vec<String> {
    let compact = format_grade(grade_numeric);
    let mut candidates = vec![compact.clone(), format!("grade {compact}")];
    if compact.ends_with(".5") {
        candidates.push(compact.replace(".5", " 5"));
    }

    let mut tokens: Vec<String> = Vec::new();
    for candidate in candidates {
        let normalized = normalize_token(&candidate);
        if !normalized.is_empty() && !tokens.contains(&normalized) {
            tokens.push(normalized);
        }
    }
    tokens
}

/// Relevance gate: strict match requires company + name + number + grade;
/// soft match substitutes the set name for the grade token.
pub fn listing_matches_identity(
    title: &str,
    card: &CardIdentity,
    grade_numeric: f64,
    company: GradingCompany,
) -> bool {
    let normalized_title = normalize_token(title);
    let name = normalize_token(&card.name);
    let name_tokens: Vec<&str> = name.split_whitespace().collect();
    let number_token = normalize_token(&card.card_number);
    let set_name = normalize_token(&card.set_name);
    let set_tokens: Vec<&str> = set_name.split_whitespace().collect();
    let grade_token_list = grade_tokens(grade_numeric);

    let has_name = name_tokens
        .iter()
        .any(|token| normalized_title.contains(token));
    let has_number = !number_token.is_empty() && normalized_title.contains(&number_token);
    let has_company = normalized_title.contains(&normalize_token(company.as_str()));
    let has_grade = grade_token_list
        .iter()
        .any(|token| normalized_title.contains(token.as_str()));
    let has_set_hint = set_tokens
        .iter()
        .any(|token| normalized_title.contains(token));

    let strict_match = has_name && has_number && has_company && has_grade;
    let soft_match = has_name && has_number && has_company && has_set_hint;

    strict_match || soft_match
}

/// IQR fences over sorted prices, or None when the sample is too small for
/// quartile statistics
fn outlier_bounds(prices: &[f64]) -> Option<(f64, f64)> {
    if prices.len() < MIN_SAMPLE_FOR_OUTLIER_REJECTION {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q1 = sorted[(sorted.len() as f64 * 0.25).floor() as usize];
    let q3 = sorted[(sorted.len() as f64 * 0.75).floor() as usize];
    let iqr = q3 - q1;
    Some((q1 - iqr * 1.5, q3 + iqr * 1.5))
}

/// Drop prices outside the IQR fences. No-op below 6 prices.
pub fn remove_outliers(prices: &[f64]) -> Vec<f64> {
    match outlier_bounds(prices) {
        None => prices.to_vec(),
        Some((min, max)) => prices
            .iter()
            .copied()
            .filter(|price| *price >= min && *price <= max)
            .collect(),
    }
}

/// Smallest price whose cumulative weight reaches `p` of the total
pub fn weighted_percentile(points: &[(f64, f64)], p: f64) -> f64 {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let total_weight: f64 = sorted.iter().map(|(_, weight)| weight).sum();
    let target = total_weight * p;

    let mut cumulative = 0.0;
    for (price, weight) in &sorted {
        cumulative += weight;
        if cumulative >= target {
            return *price;
        }
    }

    sorted.last().map(|(price, _)| *price).unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    low: i64,
    mid: i64,
    high: i64,
}

/// Recency-weighted p25/p50/p75 over outlier-cleaned comps
fn weighted_band(comps: &[SoldComp], now: DateTime<Utc>) -> Band {
    let prices: Vec<f64> = comps.iter().map(|comp| comp.price).collect();
    let bounds = outlier_bounds(&prices);

    let weighted: Vec<(f64, f64)> = comps
        .iter()
        .filter(|comp| match bounds {
            Some((min, max)) => comp.price >= min && comp.price <= max,
            None => true,
        })
        .map(|comp| {
            let age_days =
                ((now - comp.sold_at).num_seconds() as f64 / 86_400.0).max(1.0);
            let weight = (-age_days / RECENCY_DECAY_DAYS).exp();
            (comp.price, weight)
        })
        .collect();

    if weighted.is_empty() {
        return Band {
            low: 0,
            mid: 0,
            high: 0,
        };
    }

    Band {
        low: weighted_percentile(&weighted, 0.25).round() as i64,
        mid: weighted_percentile(&weighted, 0.5).round() as i64,
        high: weighted_percentile(&weighted, 0.75).round() as i64,
    }
}

/// Deterministic heuristic valuation used when no comps are available:
/// a base price keyed by known card numbers, scaled by grade and company
/// multipliers, with a fixed relative range and zero sample size.
pub fn fallback_valuation(
    card: &CardIdentity,
    grade_numeric: f64,
    company: GradingCompany,
) -> Valuation {
    let base: f64 = match card.card_number.as_str() {
        "4/102" => 900.0,
        "2/102" => 450.0,
        _ => 380.0,
    };
    let grade_multiplier = if (grade_numeric - 10.0).abs() < f64::EPSILON {
        2.25
    } else if (grade_numeric - 9.0).abs() < f64::EPSILON {
        1.12
    } else {
        0.87
    };
    let company_multiplier = match company {
        GradingCompany::Psa => 1.0,
        GradingCompany::Bgs => 0.97,
        GradingCompany::Cgc => 0.95,
    };

    let mid = (base * grade_multiplier * company_multiplier).round();

    Valuation {
        currency: "USD".to_string(),
        fair_market_value: mid as i64,
        range_low: (mid * 0.93).round() as i64,
        range_high: (mid * 1.08).round() as i64,
        sample_size: 0,
        window_days: REPORTING_WINDOW_DAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charizard() -> CardIdentity {
        CardIdentity::new("Charizard", "Base Set", "4/102")
    }

    fn comp(title: &str, price: f64, age_days: i64) -> SoldComp {
        SoldComp {
            title: title.to_string(),
            price,
            sold_at: Utc::now() - ChronoDuration::days(age_days),
        }
    }

    #[test]
    fn query_includes_identity_and_negative_terms() {
        let query = build_query(&charizard(), 10.0, GradingCompany::Psa);
        assert_eq!(
            query,
            "Charizard 4/102 Base Set PSA 10 -reprint -proxy -lot"
        );
    }

    #[test]
    fn query_keeps_half_point_grades() {
        let query = build_query(&charizard(), 9.5, GradingCompany::Bgs);
        assert!(query.contains("BGS 9.5"));
    }

    #[test]
    fn blocklist_rejects_red_flag_titles() {
        assert!(is_blocklisted("Lot of 5 reprint proxy cards"));
        assert!(is_blocklisted("Charizard REPRINT near mint"));
        assert!(is_blocklisted("not graded charizard 4/102"));
        assert!(is_blocklisted("raw Charizard base set"));
        assert!(is_blocklisted("creased but playable"));
    }

    #[test]
    fn blocklist_passes_clean_titles() {
        assert!(!is_blocklisted("PSA 9 Charizard 4/102 Base Set card"));
        assert!(!is_blocklisted("BGS 9.5 Blastoise 2/102 holo"));
    }

    #[test]
    fn normalize_keeps_slash_and_collapses_punctuation() {
        assert_eq!(
            normalize_token("PSA-9: Charizard!! 4/102"),
            "psa 9 charizard 4/102"
        );
    }

    #[test]
    fn grade_tokens_cover_spoken_style_half_points() {
        let tokens = grade_tokens(9.5);
        assert!(tokens.contains(&"9 5".to_string()));
        assert!(tokens.contains(&"grade 9 5".to_string()));

        let whole = grade_tokens(9.0);
        assert!(whole.contains(&"9".to_string()));
        assert!(whole.contains(&"grade 9".to_string()));
    }

    #[test]
    fn strict_match_requires_all_four_tokens() {
        let identity = charizard();
        assert!(listing_matches_identity(
            "PSA 9 Charizard 4/102 Base Set card",
            &identity,
            9.0,
            GradingCompany::Psa
        ));
        // company token missing
        assert!(!listing_matches_identity(
            "Charizard 4/102 Base Set 9",
            &identity,
            9.0,
            GradingCompany::Bgs
        ));
        // number token missing
        assert!(!listing_matches_identity(
            "PSA 9 Charizard Base Set",
            &identity,
            9.0,
            GradingCompany::Psa
        ));
    }

    #[test]
    fn soft_match_substitutes_set_for_grade() {
        let identity = charizard();
        // no grade token, but the set name is present
        assert!(listing_matches_identity(
            "PSA Charizard 4/102 Base Set holo",
            &identity,
            9.0,
            GradingCompany::Psa
        ));
        // neither grade nor set
        assert!(!listing_matches_identity(
            "PSA Charizard 4/102 holo",
            &identity,
            9.0,
            GradingCompany::Psa
        ));
    }

    #[test]
    fn grade_ten_token_hides_inside_slash_numbers() {
        // "4/102" contains "10", so a grade-10 search strict-matches even
        // without an explicit grade token. Inherited source behavior.
        assert!(listing_matches_identity(
            "PSA Charizard 4/102 holo",
            &charizard(),
            10.0,
            GradingCompany::Psa
        ));
    }

    #[test]
    fn half_point_grade_matches_spoken_titles() {
        let identity = CardIdentity::new("Blastoise", "Base Set", "2/102");
        assert!(listing_matches_identity(
            "BGS 9.5 Blastoise 2/102 gem",
            &identity,
            9.5,
            GradingCompany::Bgs
        ));
        assert!(listing_matches_identity(
            "BGS 9 5 Blastoise 2/102 gem",
            &identity,
            9.5,
            GradingCompany::Bgs
        ));
    }

    #[test]
    fn outlier_removal_is_noop_below_six_prices() {
        let prices = [10.0, 10000.0, 12.0, 11.0, 9.0];
        assert_eq!(remove_outliers(&prices), prices.to_vec());
    }

    #[test]
    fn outlier_removal_drops_extremes_and_stays_subset() {
        let prices = [100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 5000.0];
        let kept = remove_outliers(&prices);
        assert!(!kept.contains(&5000.0));
        assert_eq!(kept.len(), 6);
        for price in &kept {
            assert!(prices.contains(price));
        }
    }

    #[test]
    fn weighted_percentile_single_point_returns_it() {
        let points = [(250.0, 0.4)];
        assert_eq!(weighted_percentile(&points, 0.5), 250.0);
    }

    #[test]
    fn weighted_percentile_favors_heavier_points() {
        // heavy recent point at 100, light old point at 500
        let points = [(100.0, 0.9), (500.0, 0.1)];
        assert_eq!(weighted_percentile(&points, 0.5), 100.0);
    }

    #[test]
    fn weighted_band_orders_low_mid_high() {
        let comps: Vec<SoldComp> = (0..10)
            .map(|i| comp("PSA 10 Charizard 4/102", 900.0 + (i as f64) * 25.0, i))
            .collect();

        let band = weighted_band(&comps, Utc::now());
        assert!(band.low <= band.mid);
        assert!(band.mid <= band.high);
    }

    #[test]
    fn recent_sales_pull_the_band_toward_them() {
        let comps = vec![
            comp("a", 100.0, 1),
            comp("b", 100.0, 2),
            comp("c", 400.0, 300),
            comp("d", 400.0, 320),
        ];
        let band = weighted_band(&comps, Utc::now());
        assert_eq!(band.mid, 100);
    }

    #[test]
    fn fallback_charizard_psa_10_scenario() {
        let valuation = fallback_valuation(&charizard(), 10.0, GradingCompany::Psa);
        assert_eq!(valuation.fair_market_value, 2025);
        assert_eq!(valuation.range_low, 1883);
        assert_eq!(valuation.range_high, 2187);
        assert_eq!(valuation.sample_size, 0);
        assert_eq!(valuation.window_days, 90);
        assert_eq!(valuation.currency, "USD");
    }

    #[test]
    fn fallback_band_holds_for_all_grades_and_companies() {
        let cards = [
            charizard(),
            CardIdentity::new("Blastoise", "Base Set", "2/102"),
            CardIdentity::new("Umbreon", "Unknown Set", "32/75"),
        ];
        for card in &cards {
            for grade in 1..=10 {
                for company in GradingCompany::ALL {
                    let valuation = fallback_valuation(card, grade as f64, company);
                    assert!(valuation.range_low <= valuation.fair_market_value);
                    assert!(valuation.fair_market_value <= valuation.range_high);
                    assert_eq!(valuation.sample_size, 0);
                }
            }
        }
    }

    #[test]
    fn fallback_company_multiplier_ordering() {
        let psa = fallback_valuation(&charizard(), 10.0, GradingCompany::Psa);
        let bgs = fallback_valuation(&charizard(), 10.0, GradingCompany::Bgs);
        let cgc = fallback_valuation(&charizard(), 10.0, GradingCompany::Cgc);
        assert!(psa.fair_market_value > bgs.fair_market_value);
        assert!(bgs.fair_market_value > cgc.fair_market_value);
    }

    #[test]
    fn flatten_skips_incomplete_rows() {
        let payload: FindingResponse = serde_json::from_str(
            r#"{
                "findCompletedItemsResponse": [{
                    "searchResult": [{
                        "item": [
                            {
                                "title": ["PSA 10 Charizard 4/102 Base Set"],
                                "sellingStatus": [{"currentPrice": [{"__value__": "1500.00"}]}],
                                "listingInfo": [{"endTime": ["2026-07-01T12:00:00.000Z"]}]
                            },
                            {
                                "title": ["missing price"],
                                "sellingStatus": [{"currentPrice": [{}]}],
                                "listingInfo": [{"endTime": ["2026-07-01T12:00:00.000Z"]}]
                            },
                            {
                                "title": ["bad date"],
                                "sellingStatus": [{"currentPrice": [{"__value__": "10"}]}],
                                "listingInfo": [{"endTime": ["not-a-date"]}]
                            }
                        ]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let comps = flatten_listings(payload);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].price, 1500.0);
    }

    #[tokio::test]
    async fn unconfigured_client_uses_heuristic_fallback() {
        let client = MarketCompsClient::new(None).unwrap();
        let valuation = client
            .valuation_for(&charizard(), 10.0, GradingCompany::Psa)
            .await;
        assert_eq!(valuation.sample_size, 0);
        assert_eq!(valuation.fair_market_value, 2025);
    }
}
