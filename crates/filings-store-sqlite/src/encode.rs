//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, decimals as their canonical
//! string form, UUIDs as hyphenated lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, Utc};
use filings_core::{
  dimension::{AccountId, CompanyId, FactId, ReportId, StatementTypeId},
  fact::{FactView, FinancialFact, PeriodAmount},
  ratio::{RatioKind, Ratios},
  report::Report,
  store::{BatchStatus, IngestBatch},
};
use rust_decimal::Decimal;
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// Fixed-width so that text order matches time order.
pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_decimal(d: Option<Decimal>) -> Option<String> { d.map(|d| d.to_string()) }

pub fn decode_decimal(s: Option<&str>) -> Result<Option<Decimal>> {
  s.map(|s| Decimal::from_str(s).map_err(|e| Error::Decimal(format!("{s:?}: {e}"))))
    .transpose()
}

pub fn encode_status(s: BatchStatus) -> &'static str {
  match s {
    BatchStatus::Committed => "committed",
    BatchStatus::Rejected => "rejected",
  }
}

pub fn decode_status(s: &str) -> Result<BatchStatus> {
  match s {
    "committed" => Ok(BatchStatus::Committed),
    "rejected" => Ok(BatchStatus::Rejected),
    other => Err(Error::Decode(format!("unknown batch status: {other:?}"))),
  }
}

// ─── Column lists ────────────────────────────────────────────────────────────

/// Ratio columns in [`RatioKind`] order, each prefixed with `alias.`.
pub fn ratio_columns(alias: &str) -> String {
  RatioKind::iter()
    .map(|k| format!("{alias}.{}", k.column()))
    .collect::<Vec<_>>()
    .join(", ")
}

/// `SELECT` list matching [`RawFact`]; facts are aliased `f`, statement types
/// `s`, accounts `a`, reports `r`.
pub fn fact_select() -> String {
  format!(
    "f.fact_id, f.report_id, f.statement_type_id, f.account_id, f.ord,
     f.thstrm_nm, f.thstrm_amount, f.frmtrm_nm, f.frmtrm_amount,
     f.bfefrmtrm_nm, f.bfefrmtrm_amount, f.currency,
     f.created_at, f.updated_at,
     r.rcept_no, s.sj_div, s.sj_nm, a.account_nm,
     {}",
    ratio_columns("f")
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `reports` row.
pub struct RawReport {
  pub report_id:  i64,
  pub company_id: i64,
  pub rcept_no:   String,
  pub reprt_code: String,
  pub bsns_year:  i32,
  pub created_at: String,
  pub updated_at: String,
}

impl RawReport {
  pub const COLUMNS: &'static str =
    "report_id, company_id, rcept_no, reprt_code, bsns_year, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      report_id:  row.get(0)?,
      company_id: row.get(1)?,
      rcept_no:   row.get(2)?,
      reprt_code: row.get(3)?,
      bsns_year:  row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  pub fn into_report(self) -> Result<Report> {
    Ok(Report {
      report_id:  ReportId(self.report_id),
      company_id: CompanyId(self.company_id),
      rcept_no:   self.rcept_no,
      reprt_code: self.reprt_code,
      bsns_year:  self.bsns_year,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `financial_facts` row joined with its dimensions.
pub struct RawFact {
  pub fact_id:           i64,
  pub report_id:         i64,
  pub statement_type_id: i64,
  pub account_id:        i64,
  pub ord:               Option<i64>,
  pub thstrm_nm:         Option<String>,
  pub thstrm_amount:     Option<String>,
  pub frmtrm_nm:         Option<String>,
  pub frmtrm_amount:     Option<String>,
  pub bfefrmtrm_nm:      Option<String>,
  pub bfefrmtrm_amount:  Option<String>,
  pub currency:          String,
  pub created_at:        String,
  pub updated_at:        String,
  pub rcept_no:          String,
  pub sj_div:            String,
  pub sj_nm:             String,
  pub account_nm:        String,
  /// In [`RatioKind`] order.
  pub ratios:            Vec<Option<String>>,
}

impl RawFact {
  /// Read a row selected with [`fact_select`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    const FIXED: usize = 18;
    let ratios = (0..RatioKind::iter().count())
      .map(|i| row.get(FIXED + i))
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Self {
      fact_id:           row.get(0)?,
      report_id:         row.get(1)?,
      statement_type_id: row.get(2)?,
      account_id:        row.get(3)?,
      ord:               row.get(4)?,
      thstrm_nm:         row.get(5)?,
      thstrm_amount:     row.get(6)?,
      frmtrm_nm:         row.get(7)?,
      frmtrm_amount:     row.get(8)?,
      bfefrmtrm_nm:      row.get(9)?,
      bfefrmtrm_amount:  row.get(10)?,
      currency:          row.get(11)?,
      created_at:        row.get(12)?,
      updated_at:        row.get(13)?,
      rcept_no:          row.get(14)?,
      sj_div:            row.get(15)?,
      sj_nm:             row.get(16)?,
      account_nm:        row.get(17)?,
      ratios,
    })
  }

  pub fn into_view(self) -> Result<FactView> {
    let mut ratios = Ratios::default();
    for (kind, raw) in RatioKind::iter().zip(&self.ratios) {
      ratios.set(kind, decode_decimal(raw.as_deref())?);
    }

    let fact = FinancialFact {
      fact_id: FactId(self.fact_id),
      report_id: ReportId(self.report_id),
      statement_type_id: StatementTypeId(self.statement_type_id),
      account_id: AccountId(self.account_id),
      ord: self.ord,
      current: PeriodAmount {
        label:  self.thstrm_nm,
        amount: decode_decimal(self.thstrm_amount.as_deref())?,
      },
      prior: PeriodAmount {
        label:  self.frmtrm_nm,
        amount: decode_decimal(self.frmtrm_amount.as_deref())?,
      },
      prior_prior: PeriodAmount {
        label:  self.bfefrmtrm_nm,
        amount: decode_decimal(self.bfefrmtrm_amount.as_deref())?,
      },
      currency: self.currency,
      ratios,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    };

    Ok(FactView {
      fact,
      rcept_no: self.rcept_no,
      sj_div: self.sj_div,
      sj_nm: self.sj_nm,
      account_nm: self.account_nm,
    })
  }
}

/// Raw values read directly from an `ingest_batches` row.
pub struct RawBatch {
  pub batch_id:       String,
  pub started_at:     String,
  pub finished_at:    String,
  pub status:         String,
  pub record_count:   i64,
  pub warning_count:  i64,
  pub failure_index:  Option<i64>,
  pub failure_reason: Option<String>,
}

impl RawBatch {
  pub fn into_batch(self) -> Result<IngestBatch> {
    Ok(IngestBatch {
      batch_id:       decode_uuid(&self.batch_id)?,
      started_at:     decode_dt(&self.started_at)?,
      finished_at:    decode_dt(&self.finished_at)?,
      status:         decode_status(&self.status)?,
      record_count:   self.record_count.max(0) as usize,
      warning_count:  self.warning_count.max(0) as usize,
      failure_index:  self.failure_index.map(|i| i.max(0) as usize),
      failure_reason: self.failure_reason,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_and_rejects_unknown_values() {
    for status in [BatchStatus::Committed, BatchStatus::Rejected] {
      assert_eq!(decode_status(encode_status(status)).unwrap(), status);
    }
    let err = decode_status("paused").unwrap_err();
    assert!(matches!(err, Error::Decode(ref msg) if msg.contains("paused")));
  }

  #[test]
  fn timestamps_sort_as_text() {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
    let whole = parse("2024-03-12T10:00:00Z");
    let fraction = parse("2024-03-12T10:00:00.5Z");

    assert!(encode_dt(whole) < encode_dt(fraction));
    assert_eq!(encode_dt(whole).len(), encode_dt(fraction).len());
    assert_eq!(decode_dt(&encode_dt(fraction)).unwrap(), fraction);
  }
}
