//! In-memory scan store
//!
//! Owns the persisted scan records behind an async RwLock, constructed once
//! at process start and shared through `AppState`. Fresh instances per test
//! replace any module-level global state.

use chrono::Utc;
use slabscan_common::types::{ResolvedIdentity, ScanRecord, ScanStatus, Valuation};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Scan record storage. Records are created at analyze time, mutated only
/// by `confirm`, and never deleted.
pub struct ScanStore {
    scans: RwLock<HashMap<Uuid, ScanRecord>>,
}

impl ScanStore {
    pub fn new() -> Self {
        Self {
            scans: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(
        &self,
        identity: ResolvedIdentity,
        valuation: Valuation,
        needs_user_confirmation: bool,
    ) -> ScanRecord {
        let now = Utc::now();
        let record = ScanRecord {
            scan_id: Uuid::new_v4(),
            identity,
            valuation,
            needs_user_confirmation,
            status: ScanStatus::Analyzed,
            created_at: now,
            updated_at: now,
        };

        self.scans
            .write()
            .await
            .insert(record.scan_id, record.clone());
        record
    }

    pub async fn get(&self, scan_id: Uuid) -> Option<ScanRecord> {
        self.scans.read().await.get(&scan_id).cloned()
    }

    /// Flip a scan to confirmed. Idempotent: confirming a confirmed scan
    /// leaves it confirmed. Unknown ids return None.
    pub async fn confirm(&self, scan_id: Uuid) -> Option<ScanRecord> {
        let mut scans = self.scans.write().await;
        let record = scans.get_mut(&scan_id)?;
        record.status = ScanStatus::Confirmed;
        record.updated_at = Utc::now();
        Some(record.clone())
    }
}

impl Default for ScanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slabscan_common::types::{CardIdentity, GradingCompany};

    fn sample_identity() -> ResolvedIdentity {
        ResolvedIdentity {
            card: CardIdentity::new("Charizard", "Base Set", "4/102"),
            grading_company: GradingCompany::Psa,
            grade_numeric: 10.0,
            cert_number: None,
            confidence: 0.9,
            alternatives: vec![],
            raw_label_text: String::new(),
        }
    }

    fn sample_valuation() -> Valuation {
        Valuation {
            currency: "USD".to_string(),
            fair_market_value: 2025,
            range_low: 1883,
            range_high: 2187,
            sample_size: 0,
            window_days: 90,
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = ScanStore::new();
        let record = store
            .create(sample_identity(), sample_valuation(), false)
            .await;
        assert_eq!(record.status, ScanStatus::Analyzed);

        let fetched = store.get(record.scan_id).await.expect("stored record");
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let store = ScanStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn confirm_transitions_and_is_idempotent() {
        let store = ScanStore::new();
        let record = store
            .create(sample_identity(), sample_valuation(), true)
            .await;

        let confirmed = store.confirm(record.scan_id).await.expect("known id");
        assert_eq!(confirmed.status, ScanStatus::Confirmed);
        assert!(confirmed.updated_at >= record.updated_at);

        let again = store.confirm(record.scan_id).await.expect("still known");
        assert_eq!(again.status, ScanStatus::Confirmed);
    }

    #[tokio::test]
    async fn confirm_unknown_returns_none() {
        let store = ScanStore::new();
        assert!(store.confirm(Uuid::new_v4()).await.is_none());
    }
}
