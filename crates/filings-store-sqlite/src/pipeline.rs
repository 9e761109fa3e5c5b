//! Ingestion pipeline: one batch, one transaction.
//!
//! Records are grouped into filings by receipt number (first-appearance
//! order). For each filing the header is registered, its line items are
//! normalized, then the ratio engine runs once over the report. Any error
//! drops the transaction, which rolls every write of the batch back.

use std::{collections::HashMap, time::Instant};

use chrono::{DateTime, Utc};
use filings_core::{
  Error as CoreError, IngestConfig,
  record::{FilingHeader, LineItem, RawRecord},
  store::{BatchOutcome, BatchStatus},
};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{encode_dt, encode_status, encode_uuid},
  resolve::CompanyKey,
  uow::UnitOfWork,
};

/// Why a batch was rejected: the failing record's index (if any) and the
/// error.
pub type Rejection = (Option<usize>, Error);

/// All line items of one filing within a batch.
#[derive(Debug)]
struct Filing {
  header: FilingHeader,
  /// `(index in batch, validated item)` in submission order.
  items:  Vec<(usize, LineItem)>,
}

fn at(index: usize) -> impl FnOnce(Error) -> Rejection { move |e| (Some(index), e) }

/// Validate every record and group them by receipt number.
///
/// Each record's header and line item are checked together, so the first
/// invalid record in submission order is the one reported. Records of one
/// filing must agree on its identity fields.
///
/// Also returns, per `corp_code`, the company attributes of the last record
/// in the batch that carried it; those win over earlier rows.
fn group_filings(
  records: &[RawRecord],
  config: &IngestConfig,
) -> Result<(Vec<Filing>, HashMap<String, CompanyKey>), Rejection> {
  let mut filings: Vec<Filing> = Vec::new();
  let mut by_rcept: HashMap<String, usize> = HashMap::new();
  let mut companies: HashMap<String, CompanyKey> = HashMap::new();

  for (index, record) in records.iter().enumerate() {
    let header = record.header().map_err(|e| (Some(index), e.into()))?;

    let pos = match by_rcept.get(&header.rcept_no) {
      Some(&pos) => {
        let first = &filings[pos].header;
        if first.corp_code != header.corp_code
          || first.reprt_code != header.reprt_code
          || first.bsns_year != header.bsns_year
        {
          return Err((
            Some(index),
            CoreError::integrity(format!(
              "record disagrees with earlier records of filing {} on corp_code, reprt_code or bsns_year",
              header.rcept_no
            ))
            .into(),
          ));
        }
        pos
      }
      None => {
        by_rcept.insert(header.rcept_no.clone(), filings.len());
        filings.push(Filing { header: header.clone(), items: Vec::new() });
        filings.len() - 1
      }
    };

    let item = record.line_item(config).map_err(|e| (Some(index), e.into()))?;
    filings[pos].items.push((index, item));

    companies.insert(header.corp_code.clone(), CompanyKey {
      corp_code:  header.corp_code,
      corp_name:  header.corp_name,
      stock_code: header.stock_code,
    });
  }

  Ok((filings, companies))
}

/// Apply every filing through the unit of work.
fn apply(
  uow: &mut UnitOfWork<'_>,
  filings: &[Filing],
  companies: &HashMap<String, CompanyKey>,
) -> Result<(), Rejection> {
  for filing in filings {
    let Some(&(first, _)) = filing.items.first() else { continue };
    let header = &filing.header;

    uow.check_deadline().map_err(at(first))?;
    let company = companies.get(&header.corp_code).ok_or_else(|| {
      (
        Some(first),
        Error::from(CoreError::integrity(format!(
          "company {} cannot be resolved",
          header.corp_code
        ))),
      )
    })?;
    let report_id = uow.register_report(header, company).map_err(at(first))?;

    for (index, item) in &filing.items {
      uow.check_deadline().map_err(at(*index))?;
      uow
        .normalize_item(report_id, &header.rcept_no, item)
        .map_err(at(*index))?;
    }

    uow
      .refresh_ratios(report_id, &header.rcept_no)
      .map_err(|e| (None, e))?;
  }

  uow.check_deadline().map_err(|e| (None, e))
}

/// Map a failure to take or release the write lock onto the batch timeout.
///
/// The busy handler waits until the batch deadline, so a busy or locked
/// database at that point means the deadline passed while waiting.
fn lock_error(e: rusqlite::Error, config: &IngestConfig) -> Rejection {
  let error = match e.sqlite_error_code() {
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
      CoreError::Timeout(config.batch_timeout).into()
    }
    _ => e.into(),
  };
  (None, error)
}

/// Run one batch to completion on `conn`.
///
/// On success the batch is committed together with its audit row. On failure
/// nothing is written; the caller records the rejection separately.
pub fn run_batch(
  conn: &mut Connection,
  config: &IngestConfig,
  batch_id: Uuid,
  started_at: DateTime<Utc>,
  deadline: Instant,
  records: &[RawRecord],
) -> Result<BatchOutcome, Rejection> {
  let (filings, companies) = group_filings(records, config)?;

  // Wait for other writers for as long as the batch may still run.
  conn
    .busy_timeout(deadline.saturating_duration_since(Instant::now()))
    .map_err(|e| (None, e.into()))?;
  let tx = conn
    .transaction_with_behavior(TransactionBehavior::Immediate)
    .map_err(|e| lock_error(e, config))?;

  let outcome = {
    let mut uow = UnitOfWork::new(&tx, config, started_at, deadline);
    apply(&mut uow, &filings, &companies)?;
    uow.into_outcome(batch_id, records.len())
  };

  record_batch(&tx, &BatchRecord {
    batch_id,
    started_at,
    status: BatchStatus::Committed,
    record_count: records.len(),
    warning_count: outcome.warnings.len(),
    failure: None,
  })
  .map_err(|e| (None, e))?;

  tx.commit().map_err(|e| lock_error(e, config))?;
  Ok(outcome)
}

/// The audit row written for each batch.
pub struct BatchRecord<'a> {
  pub batch_id:      Uuid,
  pub started_at:    DateTime<Utc>,
  pub status:        BatchStatus,
  pub record_count:  usize,
  pub warning_count: usize,
  pub failure:       Option<(Option<usize>, &'a str)>,
}

pub fn record_batch(conn: &Connection, batch: &BatchRecord<'_>) -> Result<()> {
  let (failure_index, failure_reason) = match batch.failure {
    Some((index, reason)) => (index.map(|i| i as i64), Some(reason)),
    None => (None, None),
  };

  conn.execute(
    "INSERT INTO ingest_batches (
       batch_id, started_at, finished_at, status,
       record_count, warning_count, failure_index, failure_reason
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(batch.batch_id),
      encode_dt(batch.started_at),
      encode_dt(Utc::now()),
      encode_status(batch.status),
      batch.record_count as i64,
      batch.warning_count as i64,
      failure_index,
      failure_reason,
    ],
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(rcept_no: &str, corp_code: &str, corp_name: &str, account_nm: &str) -> RawRecord {
    RawRecord {
      corp_code: corp_code.into(),
      corp_name: corp_name.into(),
      rcept_no: rcept_no.into(),
      reprt_code: "11011".into(),
      bsns_year: "2023".into(),
      sj_div: "BS".into(),
      account_nm: account_nm.into(),
      currency: "KRW".into(),
      ..Default::default()
    }
  }

  #[test]
  fn groups_by_receipt_in_first_appearance_order() {
    let records = [
      raw("R2", "C1", "Acme", "A"),
      raw("R1", "C1", "Acme", "A"),
      raw("R2", "C1", "Acme", "B"),
    ];
    let (filings, _) = group_filings(&records, &IngestConfig::default()).unwrap();

    assert_eq!(filings.len(), 2);
    assert_eq!(filings[0].header.rcept_no, "R2");
    assert_eq!(
      filings[0].items.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
      [0, 2]
    );
    assert_eq!(filings[1].header.rcept_no, "R1");
  }

  #[test]
  fn last_company_attributes_win() {
    let records = [
      raw("R1", "C1", "ACME corp", "A"),
      raw("R2", "C1", "Acme Corp", "A"),
    ];
    let (_, companies) = group_filings(&records, &IngestConfig::default()).unwrap();
    assert_eq!(companies["C1"].corp_name, "Acme Corp");
  }

  #[test]
  fn conflicting_header_is_rejected_at_its_index() {
    let mut second = raw("R1", "C1", "Acme", "B");
    second.bsns_year = "2022".into();
    let records = [raw("R1", "C1", "Acme", "A"), second];

    let (index, err) = group_filings(&records, &IngestConfig::default()).unwrap_err();
    assert_eq!(index, Some(1));
    assert!(matches!(err, Error::Core(CoreError::Integrity(_))));
  }

  #[test]
  fn line_item_errors_are_reported_before_later_header_errors() {
    let mut bad_currency = raw("R1", "C1", "Acme", "B");
    bad_currency.currency = "XYZ".into();
    let mut bad_year = raw("R2", "C1", "Acme", "A");
    bad_year.bsns_year = "23".into();
    let records = [raw("R1", "C1", "Acme", "A"), bad_currency, bad_year];

    let (index, err) = group_filings(&records, &IngestConfig::default()).unwrap_err();
    assert_eq!(index, Some(1));
    assert!(matches!(err, Error::Core(CoreError::Validation(ref m)) if m.contains("currency")));
  }

  #[test]
  fn malformed_year_is_rejected_at_its_index() {
    let mut bad = raw("R1", "C1", "Acme", "B");
    bad.bsns_year = "23".into();
    let records = [raw("R0", "C1", "Acme", "A"), bad];

    let (index, err) = group_filings(&records, &IngestConfig::default()).unwrap_err();
    assert_eq!(index, Some(1));
    assert!(matches!(err, Error::Core(CoreError::Validation(_))));
  }
}
