//! Reports, one per filing receipt number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dimension::{CompanyId, ReportId};

/// A registered filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  pub report_id:  ReportId,
  pub company_id: CompanyId,
  /// Receipt number; the natural key.
  pub rcept_no:   String,
  pub reprt_code: String,
  pub bsns_year:  i32,
  /// Set on first registration; never changes.
  pub created_at: DateTime<Utc>,
  /// Refreshed every time the filing is ingested again.
  pub updated_at: DateTime<Utc>,
}

impl Report {
  pub fn period(&self) -> ReportPeriod { ReportPeriod::from_code(&self.reprt_code) }
}

/// The reporting period encoded by `reprt_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
  FirstQuarter,
  HalfYear,
  ThirdQuarter,
  Annual,
  Other,
}

impl ReportPeriod {
  pub fn from_code(code: &str) -> Self {
    match code.trim() {
      "11013" => Self::FirstQuarter,
      "11012" => Self::HalfYear,
      "11014" => Self::ThirdQuarter,
      "11011" => Self::Annual,
      _ => Self::Other,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::FirstQuarter => "Q1",
      Self::HalfYear => "H1",
      Self::ThirdQuarter => "Q3",
      Self::Annual => "FY",
      Self::Other => "?",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn period_codes() {
    assert_eq!(ReportPeriod::from_code("11011"), ReportPeriod::Annual);
    assert_eq!(ReportPeriod::from_code(" 11013 "), ReportPeriod::FirstQuarter);
    assert_eq!(ReportPeriod::from_code("99999").label(), "?");
  }
}
