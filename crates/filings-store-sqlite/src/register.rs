//! Report registrar: receipt number → report, linked to its company.

use filings_core::{
  Error as CoreError,
  dimension::ReportId,
  record::FilingHeader,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{encode::encode_dt, resolve::CompanyKey, uow::UnitOfWork, Result};

impl UnitOfWork<'_> {
  /// Register a filing, or refresh the non-identity fields of a known one.
  ///
  /// `company` carries the latest company attributes seen in the batch for
  /// the header's `corp_code`.
  pub fn register_report(
    &mut self,
    header: &FilingHeader,
    company: &CompanyKey,
  ) -> Result<ReportId> {
    if header.rcept_no.trim().is_empty() {
      return Err(CoreError::integrity("missing natural key `rcept_no`").into());
    }
    let company_id = self.resolve_company(company)?;
    let now = encode_dt(self.now);

    let existing: Option<(i64, i64, String)> = self
      .conn
      .prepare_cached(
        "SELECT r.report_id, r.company_id, c.corp_code
         FROM reports r JOIN companies c ON c.company_id = r.company_id
         WHERE r.rcept_no = ?1",
      )?
      .query_row(rusqlite::params![header.rcept_no], |r| {
        Ok((r.get(0)?, r.get(1)?, r.get(2)?))
      })
      .optional()?;

    match existing {
      Some((_, owner, owner_code)) if owner != company_id.0 => {
        Err(CoreError::integrity(format!(
          "report {} is registered to company {owner_code}, not {}",
          header.rcept_no, header.corp_code
        ))
        .into())
      }
      Some((report_id, _, _)) => {
        self
          .conn
          .prepare_cached(
            "UPDATE reports SET reprt_code = ?2, bsns_year = ?3, updated_at = ?4
             WHERE report_id = ?1",
          )?
          .execute(rusqlite::params![report_id, header.reprt_code, header.bsns_year, now])?;
        self.stats.reports_updated += 1;
        debug!(rcept_no = %header.rcept_no, report_id, "re-filed report");
        Ok(ReportId(report_id))
      }
      None => {
        let report_id: i64 = self
          .conn
          .prepare_cached(
            "INSERT INTO reports (rcept_no, company_id, reprt_code, bsns_year, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING report_id",
          )?
          .query_row(
            rusqlite::params![
              header.rcept_no,
              company_id.0,
              header.reprt_code,
              header.bsns_year,
              now,
            ],
            |r| r.get(0),
          )?;
        self.stats.reports_registered += 1;
        debug!(rcept_no = %header.rcept_no, report_id, "registered report");
        Ok(ReportId(report_id))
      }
    }
  }
}
