//! Service modules for the scan valuation pipeline

pub mod analyzer;
pub mod cert_lookup;
pub mod label_extractor;
pub mod market_comps;
pub mod scan_store;
pub mod vision;

pub use analyzer::{AnalysisOutcome, ScanAnalyzer};
pub use cert_lookup::{CertLookupClient, CertLookupError};
pub use label_extractor::LabelFields;
pub use market_comps::{MarketCompsClient, MarketError};
pub use scan_store::ScanStore;
pub use vision::{
    DeterministicFallbackResolver, IdentityResolver, ModelBackedResolver, VisionError,
    WithFallback,
};
