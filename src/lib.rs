//! MapleNest Core Service Library
//!
//! This library provides the backend core for the MapleNest rental
//! marketplace: location-aware property ranking and the credit-check
//! workflow (payment capture, verification inquiry, status polling, report
//! retrieval), with mock providers for development and test.
//!
//! # Modules
//!
//! - `clock`: Time source abstraction for deterministic tests.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `geo`: Haversine distance, bounding boxes, distance ranking.
//! - `handlers`: HTTP request handlers.
//! - `location`: Location resolution cascade.
//! - `models`: Core data models and provider wire models.
//! - `orchestrator`: Credit-check workflow orchestration and polling.
//! - `payment`: Payment provider clients (mock and live).
//! - `report`: Credit report mapping and score derivation.
//! - `verification`: Verification provider clients (mock and live).

pub mod clock;
pub mod config;
pub mod errors;
pub mod geo;
pub mod handlers;
pub mod location;
pub mod models;
pub mod orchestrator;
pub mod payment;
pub mod report;
pub mod verification;
