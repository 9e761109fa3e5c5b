//! [`UnitOfWork`]: the explicit state of one batch.
//!
//! A unit of work borrows the open batch transaction and carries everything
//! the resolver, registrar and normalizer need: configuration, the batch
//! clock, the deadline and the running counters. Nothing about the current
//! batch lives anywhere else.

use std::time::Instant;

use chrono::{DateTime, Utc};
use filings_core::{IngestConfig, ratio::RatioWarning, store::BatchOutcome};
use rusqlite::Connection;
use uuid::Uuid;

use crate::Result;

/// Running counters of a batch.
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
  pub companies_created:  usize,
  pub reports_registered: usize,
  pub reports_updated:    usize,
  pub facts_inserted:     usize,
  pub facts_updated:      usize,
  pub warnings:           Vec<RatioWarning>,
}

pub struct UnitOfWork<'t> {
  /// The batch transaction; every statement runs inside it.
  pub conn:   &'t Connection,
  pub config: &'t IngestConfig,
  /// Timestamp written to every row touched by this batch.
  pub now:    DateTime<Utc>,
  pub stats:  BatchStats,
  deadline:   Instant,
}

impl<'t> UnitOfWork<'t> {
  pub fn new(
    conn: &'t Connection,
    config: &'t IngestConfig,
    now: DateTime<Utc>,
    deadline: Instant,
  ) -> Self {
    Self { conn, config, now, stats: BatchStats::default(), deadline }
  }

  /// Fail with a timeout once the batch deadline has passed.
  pub fn check_deadline(&self) -> Result<()> {
    if Instant::now() >= self.deadline {
      return Err(filings_core::Error::Timeout(self.config.batch_timeout).into());
    }
    Ok(())
  }

  pub fn into_outcome(self, batch_id: Uuid, records: usize) -> BatchOutcome {
    let BatchStats {
      companies_created,
      reports_registered,
      reports_updated,
      facts_inserted,
      facts_updated,
      warnings,
    } = self.stats;

    BatchOutcome {
      batch_id,
      records,
      companies_created,
      reports_registered,
      reports_updated,
      facts_inserted,
      facts_updated,
      warnings,
    }
  }
}
