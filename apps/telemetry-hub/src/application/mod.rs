//! Application Layer - Use cases and port definitions.
//!
//! This layer orchestrates the domain: it validates and stores incoming
//! readings, evaluates alerts, and hands results to whatever publisher the
//! infrastructure layer plugs in.

/// Port interfaces for outbound delivery.
pub mod ports;

/// Application services for ingestion and history queries.
pub mod services;
