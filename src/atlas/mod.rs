//! Cognitive Atlas task collection.
//!
//! This module provides the HTTP client for the Cognitive Atlas API and
//! the collector that mirrors task records onto disk.

pub mod client;
pub mod collector;

pub use client::AtlasClient;
pub use collector::TaskCollector;
