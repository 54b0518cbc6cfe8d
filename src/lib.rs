//! # Email Intel
//!
//! Multi-source intelligence about an email address: search fan-out over
//! unreliable, rate-limited sources, content extraction, profile merging
//! and confidence-scored digital twins.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Orchestrator │──▶│   Sources    │──▶│ FetchContext │──▶│ Fetcher  │
//! │ queries+rank │   │ web/acad/pdf │   │ limit+retry  │   │  (HTTP)  │
//! └──────┬───────┘   └──────────────┘   └──────────────┘   └──────────┘
//!        │ RawResult[]
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Analyzers   │──▶│  Aggregator  │──▶│ ProfileStore │
//! │ page/acad/pdf│   │ merge policy │   │ SQLite / mem │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │ Digital twin │
//!                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! eint init                          # create the profile database
//! eint validate someone@example.com  # format and reputation only
//! eint collect someone@example.com   # full collection, stored
//! eint twin someone@example.com      # academic digital twin
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and validation |
//! | [`error`] | `IntelError`, `FetchError` |
//! | [`models`] | Queries, hits, facts, profiles |
//! | [`validate`] | Email normalization, reputation, extraction |
//! | [`rate_limit`] | Adaptive per-domain delays |
//! | [`cache`] | TTL cache of per-source results |
//! | [`error_tracker`] | Failed fetch log |
//! | [`fetch`] | Page fetcher and retrying fetch context |
//! | [`rules`] | Extraction selector and pattern tables |
//! | [`score`] | URL normalization, relevance and academic scores |
//! | [`sources`] | Source fetchers and their registry |
//! | [`orchestrator`] | Query generation, fan-out, dedup and ranking |
//! | [`analyzer`] | Page and hit content analysis |
//! | [`academic`] | Degrees, positions, publications |
//! | [`pdf`] | PDF text extraction and analysis |
//! | [`aggregate`] | Profile merge policy and scores |
//! | [`twin`] | Digital twin synthesis |
//! | [`store`] | Profile persistence |
//! | [`pipeline`] | Entry points |

pub mod academic;
pub mod aggregate;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod error_tracker;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod pdf;
pub mod pipeline;
pub mod rate_limit;
pub mod rules;
pub mod score;
pub mod sources;
pub mod store;
pub mod twin;
pub mod validate;

pub use error::IntelError;
pub use pipeline::{Pipeline, PipelineBuilder};
