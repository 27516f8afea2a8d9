//! Legislator Profile Sync Library
//!
//! Pulls National Assembly member and bill feeds, reconciles them into one
//! profile per legislator, fills missing education/career data from a chain
//! of fallback sources, and persists the result.
//!
//! # Modules
//!
//! - `services`: Open API feed client (members, bills, historical records).
//! - `election`: Election results table loaded from CSV.
//! - `profile_fetcher`: Profile page fetcher with circuit breaker and page cache.
//! - `noise`, `segmenter`, `classifier`, `lexicon`: Biography text pipeline.
//! - `enrichment`: Ordered fallback chain of biography sources.
//! - `identity`: Record-to-person resolution and per-term updates.
//! - `members`, `dedup`, `bills`: Sync passes.
//! - `sync_job`: Single-flight background job and its status.
//! - `store`, `db`, `db_storage`: Persistence seams and Postgres storage.
//! - `handlers`: HTTP handlers.

pub mod bills;
pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod contact;
pub mod db;
pub mod db_storage;
pub mod dedup;
pub mod election;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod lexicon;
pub mod members;
pub mod models;
pub mod noise;
pub mod page_cache;
pub mod profile_fetcher;
pub mod segmenter;
pub mod services;
pub mod store;
pub mod sync_job;
