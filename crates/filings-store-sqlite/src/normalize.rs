//! Fact normalizer and ratio refresh.
//!
//! A line item becomes one fact row keyed by (report, statement type,
//! account). Re-filed items overwrite amounts and labels in place; strict mode
//! refuses to. Once every item of a report is in, the report's ratios are
//! recomputed from all of its facts and written onto each of them.

use filings_core::{
  Error as CoreError,
  dimension::{FactId, ReportId},
  ratio::{AccountAmounts, RatioEngine, RatioKind},
  record::LineItem,
};
use rusqlite::{OptionalExtension as _, types::Value};
use strum::IntoEnumIterator as _;
use tracing::warn;

use crate::{
  Result,
  encode::{decode_decimal, encode_decimal, encode_dt},
  uow::UnitOfWork,
};

impl UnitOfWork<'_> {
  /// Upsert the fact for `item` under `report_id`.
  pub fn normalize_item(
    &mut self,
    report_id: ReportId,
    rcept_no: &str,
    item: &LineItem,
  ) -> Result<FactId> {
    let statement_type_id = self.resolve_statement_type(item)?;
    let account_id = self.resolve_account(item)?;

    let existing: Option<i64> = self
      .conn
      .prepare_cached(
        "SELECT fact_id FROM financial_facts
         WHERE report_id = ?1 AND statement_type_id = ?2 AND account_id = ?3",
      )?
      .query_row(
        rusqlite::params![report_id.0, statement_type_id.0, account_id.0],
        |r| r.get(0),
      )
      .optional()?;

    let current = encode_decimal(item.current.amount);
    let prior = encode_decimal(item.prior.amount);
    let prior_prior = encode_decimal(item.prior_prior.amount);
    let now = encode_dt(self.now);

    match existing {
      Some(_) if self.config.strict_fact_insert => Err(CoreError::DuplicateFact {
        rcept_no:   rcept_no.to_owned(),
        sj_div:     item.sj_div.clone(),
        account_nm: item.account_nm.clone(),
      }
      .into()),
      Some(fact_id) => {
        self
          .conn
          .prepare_cached(
            "UPDATE financial_facts SET
               ord = ?2, thstrm_nm = ?3, thstrm_amount = ?4,
               frmtrm_nm = ?5, frmtrm_amount = ?6,
               bfefrmtrm_nm = ?7, bfefrmtrm_amount = ?8,
               currency = ?9, updated_at = ?10
             WHERE fact_id = ?1",
          )?
          .execute(rusqlite::params![
            fact_id,
            item.ord,
            item.current.label,
            current,
            item.prior.label,
            prior,
            item.prior_prior.label,
            prior_prior,
            item.currency,
            now,
          ])?;
        self.stats.facts_updated += 1;
        Ok(FactId(fact_id))
      }
      None => {
        let fact_id: i64 = self
          .conn
          .prepare_cached(
            "INSERT INTO financial_facts (
               report_id, statement_type_id, account_id, ord,
               thstrm_nm, thstrm_amount, frmtrm_nm, frmtrm_amount,
               bfefrmtrm_nm, bfefrmtrm_amount, currency, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
             RETURNING fact_id",
          )?
          .query_row(
            rusqlite::params![
              report_id.0,
              statement_type_id.0,
              account_id.0,
              item.ord,
              item.current.label,
              current,
              item.prior.label,
              prior,
              item.prior_prior.label,
              prior_prior,
              item.currency,
              now,
            ],
            |r| r.get(0),
          )?;
        self.stats.facts_inserted += 1;
        Ok(FactId(fact_id))
      }
    }
  }

  /// Recompute the ratios of one report and write them onto all its facts.
  pub fn refresh_ratios(&mut self, report_id: ReportId, rcept_no: &str) -> Result<()> {
    type Row = (String, String, Option<String>, Option<String>);

    let rows: Vec<Row> = self
      .conn
      .prepare_cached(
        "SELECT s.sj_div, a.account_nm, f.thstrm_amount, f.frmtrm_amount
         FROM financial_facts f
         JOIN statement_types s ON s.statement_type_id = f.statement_type_id
         JOIN accounts        a ON a.account_id        = f.account_id
         WHERE f.report_id = ?1
         ORDER BY s.sj_div, f.ord, f.fact_id",
      )?
      .query_map(rusqlite::params![report_id.0], |r| {
        Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
      })?
      .collect::<rusqlite::Result<_>>()?;

    let decoded = rows
      .iter()
      .map(|(sj_div, account_nm, cur, prev)| {
        Ok((
          sj_div.as_str(),
          account_nm.as_str(),
          decode_decimal(cur.as_deref())?,
          decode_decimal(prev.as_deref())?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;
    let amounts: Vec<AccountAmounts<'_>> = decoded
      .iter()
      .map(|&(sj_div, account_nm, current, prior)| AccountAmounts {
        sj_div,
        account_nm,
        current,
        prior,
      })
      .collect();

    let report = RatioEngine::new(self.config).compute(rcept_no, &amounts);

    let assignments = RatioKind::iter()
      .enumerate()
      .map(|(i, kind)| format!("{} = ?{}", kind.column(), i + 1))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "UPDATE financial_facts SET {assignments} WHERE report_id = ?{}",
      RatioKind::iter().count() + 1
    );

    let mut params: Vec<Value> = RatioKind::iter()
      .map(|kind| encode_decimal(report.ratios.get(kind)).map_or(Value::Null, Value::Text))
      .collect();
    params.push(Value::Integer(report_id.0));
    self
      .conn
      .prepare_cached(&sql)?
      .execute(rusqlite::params_from_iter(params))?;

    for w in &report.warnings {
      warn!(rcept_no = %w.rcept_no, ratio = %w.ratio, role = %w.role, reason = ?w.reason, "ratio left null");
    }
    self.stats.warnings.extend(report.warnings);
    Ok(())
  }
}
