//! [`SqliteStore`]: the SQLite implementation of [`DisclosureStore`].

use std::{path::Path, sync::Arc, time::{Duration, Instant}};

use chrono::Utc;
use filings_core::{
  IngestConfig,
  dimension::{Account, AccountId, Company, CompanyId, StatementType, StatementTypeId},
  fact::FactView,
  record::RawRecord,
  report::Report,
  store::{BatchFailure, BatchOutcome, BatchStatus, DisclosureStore, IngestBatch},
};
use rusqlite::OptionalExtension as _;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawBatch, RawFact, RawReport, fact_select},
  pipeline::{self, BatchRecord},
  schema::SCHEMA,
};

/// How long reads and schema setup wait for another connection's lock.
/// Batches instead wait until their own deadline.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A disclosure store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection and configuration are
/// reference-counted. Separate `SqliteStore`s opened on the same file may
/// ingest concurrently; their batches serialize on SQLite's write lock.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  config: Arc<IngestConfig>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, config: IngestConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, config).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory(config: IngestConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, config).await
  }

  async fn init(conn: tokio_rusqlite::Connection, config: IngestConfig) -> Result<Self> {
    let config = config.validate()?;
    let store = Self { conn, config: Arc::new(config) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub fn config(&self) -> &IngestConfig { &self.config }

  /// Record a rejected batch outside the rolled-back transaction.
  async fn record_rejection(
    &self,
    batch_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    record_count: usize,
    index: Option<usize>,
    reason: String,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        Ok(pipeline::record_batch(conn, &BatchRecord {
          batch_id,
          started_at,
          status: BatchStatus::Rejected,
          record_count,
          warning_count: 0,
          failure: Some((index, &reason)),
        }))
      })
      .await??;
    Ok(())
  }
}

// ─── DisclosureStore impl ────────────────────────────────────────────────────

impl DisclosureStore for SqliteStore {
  type Error = Error;

  async fn ingest(
    &self,
    records: Vec<RawRecord>,
  ) -> std::result::Result<BatchOutcome, BatchFailure<Error>> {
    let batch_id = Uuid::new_v4();
    let started_at = Utc::now();
    let deadline = Instant::now() + self.config.batch_timeout;
    let record_count = records.len();
    let config = Arc::clone(&self.config);

    let result = self
      .conn
      .call(move |conn| {
        let result = pipeline::run_batch(conn, &config, batch_id, started_at, deadline, &records);
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(result)
      })
      .await;

    let (index, error) = match result {
      Ok(Ok(outcome)) => {
        info!(
          %batch_id,
          reports_registered = outcome.reports_registered,
          reports_updated = outcome.reports_updated,
          facts_inserted = outcome.facts_inserted,
          facts_updated = outcome.facts_updated,
          warnings = outcome.warnings.len(),
          "batch committed"
        );
        return Ok(outcome);
      }
      Ok(Err(rejection)) => rejection,
      Err(e) => (None, Error::from(e)),
    };

    warn!(%batch_id, index = ?index, %error, "batch rejected");
    if let Err(audit) = self
      .record_rejection(batch_id, started_at, record_count, index, error.to_string())
      .await
    {
      warn!(%batch_id, error = %audit, "failed to record rejected batch");
    }

    Err(BatchFailure { batch_id, index, error })
  }

  async fn get_company(&self, corp_code: &str) -> Result<Option<Company>> {
    let corp_code = corp_code.trim().to_owned();
    let company = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT company_id, corp_code, corp_name, stock_code
             FROM companies WHERE corp_code = ?1",
            rusqlite::params![corp_code],
            company_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(company)
  }

  async fn list_companies(&self) -> Result<Vec<Company>> {
    let companies = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT company_id, corp_code, corp_name, stock_code
           FROM companies ORDER BY corp_code",
        )?;
        let rows = stmt
          .query_map([], company_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(companies)
  }

  async fn get_report(&self, rcept_no: &str) -> Result<Option<Report>> {
    let rcept_no = rcept_no.trim().to_owned();
    let raw: Option<RawReport> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM reports WHERE rcept_no = ?1", RawReport::COLUMNS),
            rusqlite::params![rcept_no],
            RawReport::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawReport::into_report).transpose()
  }

  async fn list_statement_types(&self) -> Result<Vec<StatementType>> {
    let types = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT statement_type_id, sj_div, sj_nm FROM statement_types ORDER BY sj_div",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(StatementType {
              statement_type_id: StatementTypeId(row.get(0)?),
              sj_div:            row.get(1)?,
              sj_nm:             row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(types)
  }

  async fn list_accounts(&self) -> Result<Vec<Account>> {
    let accounts = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT account_id, account_nm, ord FROM accounts ORDER BY account_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Account {
              account_id: AccountId(row.get(0)?),
              account_nm: row.get(1)?,
              ord:        row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(accounts)
  }

  async fn report_facts(&self, rcept_no: &str) -> Result<Vec<FactView>> {
    let rcept_no = rcept_no.trim().to_owned();
    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {}
           FROM financial_facts f
           JOIN reports         r ON r.report_id         = f.report_id
           JOIN statement_types s ON s.statement_type_id = f.statement_type_id
           JOIN accounts        a ON a.account_id        = f.account_id
           WHERE r.rcept_no = ?1
           ORDER BY s.sj_div, f.ord, f.fact_id",
          fact_select()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![rcept_no], RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_view).collect()
  }

  async fn list_batches(&self, limit: usize) -> Result<Vec<IngestBatch>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let raws: Vec<RawBatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT batch_id, started_at, finished_at, status,
                  record_count, warning_count, failure_index, failure_reason
           FROM ingest_batches
           ORDER BY started_at DESC, rowid DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |row| {
            Ok(RawBatch {
              batch_id:       row.get(0)?,
              started_at:     row.get(1)?,
              finished_at:    row.get(2)?,
              status:         row.get(3)?,
              record_count:   row.get(4)?,
              warning_count:  row.get(5)?,
              failure_index:  row.get(6)?,
              failure_reason: row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBatch::into_batch).collect()
  }
}

fn company_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Company> {
  Ok(Company {
    company_id: CompanyId(row.get(0)?),
    corp_code:  row.get(1)?,
    corp_name:  row.get(2)?,
    stock_code: row.get(3)?,
  })
}
