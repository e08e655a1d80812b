//! HTTP API handlers for slabscan-api

pub mod health;
pub mod scans;

pub use health::health_routes;
pub use scans::scan_routes;
