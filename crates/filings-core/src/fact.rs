//! Financial facts: one normalized measurement per (report, statement type,
//! account).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  dimension::{AccountId, FactId, ReportId, StatementTypeId},
  ratio::Ratios,
};

/// A period label and the amount disclosed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAmount {
  pub label:  Option<String>,
  pub amount: Option<Decimal>,
}

/// A persisted fact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialFact {
  pub fact_id:           FactId,
  pub report_id:         ReportId,
  pub statement_type_id: StatementTypeId,
  pub account_id:        AccountId,
  /// Presentation order within this report.
  pub ord:               Option<i64>,
  /// `thstrm_*`
  pub current:           PeriodAmount,
  /// `frmtrm_*`
  pub prior:             PeriodAmount,
  /// `bfefrmtrm_*`
  pub prior_prior:       PeriodAmount,
  pub currency:          String,
  /// Report-level ratios, identical on every fact of the report.
  pub ratios:            Ratios,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// A fact joined with its dimension labels, for reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactView {
  pub fact:       FinancialFact,
  pub rcept_no:   String,
  pub sj_div:     String,
  pub sj_nm:      String,
  pub account_nm: String,
}
