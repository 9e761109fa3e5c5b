//! The `DisclosureStore` trait and batch result types.
//!
//! The trait is implemented by storage backends (e.g.
//! `filings-store-sqlite`). The CLI depends on this abstraction, not on any
//! concrete backend.

use std::{fmt, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  dimension::{Account, Company, StatementType},
  fact::FactView,
  ratio::RatioWarning,
  record::RawRecord,
  report::Report,
};

// ─── Batch results ───────────────────────────────────────────────────────────

/// Counters and warnings of a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub batch_id:           Uuid,
  pub records:            usize,
  pub companies_created:  usize,
  pub reports_registered: usize,
  pub reports_updated:    usize,
  pub facts_inserted:     usize,
  pub facts_updated:      usize,
  /// Ratios left null, one entry per (report, ratio).
  pub warnings:           Vec<RatioWarning>,
}

/// A rejected batch. Nothing from the batch was persisted.
#[derive(Debug)]
pub struct BatchFailure<E> {
  pub batch_id: Uuid,
  /// 0-based position of the offending record in the submitted batch, when
  /// the failure is attributable to one record.
  pub index:    Option<usize>,
  pub error:    E,
}

impl<E: fmt::Display> fmt::Display for BatchFailure<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.index {
      Some(i) => write!(f, "batch {} rejected at record {i}: {}", self.batch_id, self.error),
      None => write!(f, "batch {} rejected: {}", self.batch_id, self.error),
    }
  }
}

impl<E> std::error::Error for BatchFailure<E>
where
  E: std::error::Error + 'static,
{
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.error) }
}

/// Final state of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
  Committed,
  Rejected,
}

/// An audit row describing one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestBatch {
  pub batch_id:       Uuid,
  pub started_at:     DateTime<Utc>,
  pub finished_at:    DateTime<Utc>,
  pub status:         BatchStatus,
  pub record_count:   usize,
  pub warning_count:  usize,
  pub failure_index:  Option<usize>,
  pub failure_reason: Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a disclosure store backend.
///
/// [`ingest`](DisclosureStore::ingest) applies a batch atomically: either
/// every record contributes to committed state or the whole batch is rejected
/// and nothing is visible. The read methods are thin accessors over the
/// persisted relations.
pub trait DisclosureStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Register, normalize and compute ratios for a batch of raw records.
  fn ingest(
    &self,
    records: Vec<RawRecord>,
  ) -> impl Future<Output = Result<BatchOutcome, BatchFailure<Self::Error>>> + Send + '_;

  fn get_company<'a>(
    &'a self,
    corp_code: &'a str,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + 'a;

  fn list_companies(
    &self,
  ) -> impl Future<Output = Result<Vec<Company>, Self::Error>> + Send + '_;

  fn get_report<'a>(
    &'a self,
    rcept_no: &'a str,
  ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + 'a;

  fn list_statement_types(
    &self,
  ) -> impl Future<Output = Result<Vec<StatementType>, Self::Error>> + Send + '_;

  fn list_accounts(
    &self,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// All facts of a report, ordered by statement and presentation order.
  fn report_facts<'a>(
    &'a self,
    rcept_no: &'a str,
  ) -> impl Future<Output = Result<Vec<FactView>, Self::Error>> + Send + 'a;

  /// Most recent ingestion runs first.
  fn list_batches(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<IngestBatch>, Self::Error>> + Send + '_;
}
