//! Structured record of failed fetches.
//!
//! Every fetch that exhausts its attempts leaves exactly one
//! [`ErrorRecord`]. Records are diagnostic only; nothing in the pipeline
//! fails because of them.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub url: String,
    pub domain: String,
    pub kind: String,
    pub message: String,
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_domain: BTreeMap<String, usize>,
}

#[derive(Default)]
pub struct ErrorTracker {
    records: Mutex<Vec<ErrorRecord>>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: &str, domain: &str, error: &FetchError, attempts: u32) {
        tracing::warn!(url, domain, kind = error.kind(), attempts, "fetch failed: {error}");
        let record = ErrorRecord {
            url: url.to_string(),
            domain: domain.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            attempts,
            at: Utc::now(),
        };
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(record);
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> ErrorSummary {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let mut summary = ErrorSummary {
            total: records.len(),
            ..ErrorSummary::default()
        };
        for r in records.iter() {
            *summary.by_kind.entry(r.kind.clone()).or_default() += 1;
            *summary.by_domain.entry(r.domain.clone()).or_default() += 1;
        }
        summary
    }
}
