//! Wikiharvest Core Library
//!
//! This library moves digital-library media assets from a metadata aggregator
//! into a public wiki media repository: per catalog record it evaluates
//! eligibility, resolves asset URLs (direct lists or IIIF manifests),
//! fetches and content-addresses the assets into durable object storage, and
//! publishes them to the target repository with duplicate-by-hash protection.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Retrying GET/HEAD client shared by all outbound fetches
//! - [`record`] - Typed record model, aggregator API, provider directory
//! - [`eligibility`] - Publication rules and the derived-manifest probe
//! - [`manifest`] - IIIF manifest parsing and URL maximization
//! - [`store`] - Object-store wrapper and deterministic path layout
//! - [`ingest`] - Fetch-validate-store for individual assets
//! - [`wiki`] - Target repository client (hash lookup, upload)
//! - [`publish`] - Publication with duplicate short-circuit and title derivation
//! - [`tracker`] - Run-wide outcome counters
//! - [`pipeline`] - Bounded-concurrency driver with failure isolation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod eligibility;
pub mod http;
pub mod ingest;
pub mod manifest;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod store;
pub mod tracker;
pub mod wiki;

// Re-export commonly used types
pub use http::{DEFAULT_MAX_RETRIES, FetchClient, FetchError, RetryPolicy};
pub use ingest::{IngestError, IngestOutcome, Ingestor};
pub use manifest::{ManifestError, ManifestResolver};
pub use pipeline::{DEFAULT_CONCURRENCY, Pipeline, PipelineConfig, PipelineError};
pub use publish::{PublishError, PublishOutcome, Publisher};
pub use record::{AggregatorClient, AggregatorError, Record};
pub use store::{MediaStore, StoreError};
pub use tracker::{Outcome, Tracker};
pub use wiki::{MediaWikiClient, WikiError, WikiRepository};
