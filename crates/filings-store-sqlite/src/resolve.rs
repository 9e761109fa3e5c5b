//! Dimension resolver: natural key → surrogate identity.
//!
//! Every resolve runs inside the batch's `BEGIN IMMEDIATE` transaction, so the
//! lookup and the insert that may follow it hold the database write lock
//! together; the `UNIQUE` natural-key indexes back this up. Resolving the same
//! key twice, in one batch or across batches, yields the same identity.

use filings_core::{
  Error as CoreError,
  config::AccountKeyMode,
  dimension::{AccountId, CompanyId, StatementTypeId},
  record::LineItem,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{Result, uow::UnitOfWork};

/// The company part of a filing header, with the batch's latest attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyKey {
  pub corp_code:  String,
  pub corp_name:  String,
  pub stock_code: Option<String>,
}

impl UnitOfWork<'_> {
  /// Resolve or create the company, refreshing name and stock code in place.
  pub fn resolve_company(&mut self, key: &CompanyKey) -> Result<CompanyId> {
    if key.corp_code.trim().is_empty() {
      return Err(CoreError::integrity("missing natural key `corp_code`").into());
    }

    let existing: Option<(i64, String, Option<String>)> = self
      .conn
      .prepare_cached(
        "SELECT company_id, corp_name, stock_code FROM companies WHERE corp_code = ?1",
      )?
      .query_row(rusqlite::params![key.corp_code], |r| {
        Ok((r.get(0)?, r.get(1)?, r.get(2)?))
      })
      .optional()?;

    match existing {
      Some((id, name, stock)) => {
        let new_name = if key.corp_name.is_empty() { name.clone() } else { key.corp_name.clone() };
        if new_name != name || key.stock_code != stock {
          self
            .conn
            .prepare_cached(
              "UPDATE companies SET corp_name = ?2, stock_code = ?3 WHERE company_id = ?1",
            )?
            .execute(rusqlite::params![id, new_name, key.stock_code])?;
          debug!(corp_code = %key.corp_code, corp_name = %new_name, "refreshed company");
        }
        Ok(CompanyId(id))
      }
      None => {
        let id: i64 = self
          .conn
          .prepare_cached(
            "INSERT INTO companies (corp_code, corp_name, stock_code)
             VALUES (?1, ?2, ?3)
             RETURNING company_id",
          )?
          .query_row(
            rusqlite::params![key.corp_code, key.corp_name, key.stock_code],
            |r| r.get(0),
          )?;
        self.stats.companies_created += 1;
        debug!(corp_code = %key.corp_code, company_id = id, "created company");
        Ok(CompanyId(id))
      }
    }
  }

  /// Resolve or create the statement type, refreshing its label.
  pub fn resolve_statement_type(&self, item: &LineItem) -> Result<StatementTypeId> {
    let id: i64 = self
      .conn
      .prepare_cached(
        "INSERT INTO statement_types (sj_div, sj_nm) VALUES (?1, ?2)
         ON CONFLICT (sj_div) DO UPDATE SET
           sj_nm = CASE WHEN excluded.sj_nm = '' THEN sj_nm ELSE excluded.sj_nm END
         RETURNING statement_type_id",
      )?
      .query_row(rusqlite::params![item.sj_div, item.sj_nm], |r| r.get(0))?;
    Ok(StatementTypeId(id))
  }

  /// Resolve or create the account according to the configured key mode.
  ///
  /// Keyed by name, the account's `ord` follows the latest report. Keyed by
  /// name and order, each distinct order is its own account.
  pub fn resolve_account(&self, item: &LineItem) -> Result<AccountId> {
    let ord_key = match self.config.account_key {
      AccountKeyMode::Name => String::new(),
      AccountKeyMode::NameAndOrder => item.ord.map(|o| o.to_string()).unwrap_or_default(),
    };

    let id: i64 = self
      .conn
      .prepare_cached(
        "INSERT INTO accounts (account_nm, ord_key, ord) VALUES (?1, ?2, ?3)
         ON CONFLICT (account_nm, ord_key) DO UPDATE SET
           ord = COALESCE(excluded.ord, ord)
         RETURNING account_id",
      )?
      .query_row(rusqlite::params![item.account_nm, ord_key, item.ord], |r| r.get(0))?;
    Ok(AccountId(id))
  }
}
