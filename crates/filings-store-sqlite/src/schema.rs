//! SQL schema for the disclosure store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Amounts and ratios are stored as canonical decimal text. The ratio column
/// names match `RatioKind::column`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS companies (
    company_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    corp_code   TEXT NOT NULL UNIQUE CHECK (length(corp_code) > 0),
    corp_name   TEXT NOT NULL,
    stock_code  TEXT
);

CREATE TABLE IF NOT EXISTS statement_types (
    statement_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sj_div            TEXT NOT NULL UNIQUE CHECK (length(sj_div) > 0),
    sj_nm             TEXT NOT NULL
);

-- ord_key is '' when accounts are keyed by name alone, otherwise the
-- presentation order the variant was first seen with.
CREATE TABLE IF NOT EXISTS accounts (
    account_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    account_nm  TEXT NOT NULL CHECK (length(account_nm) > 0),
    ord_key     TEXT NOT NULL DEFAULT '',
    ord         INTEGER,
    UNIQUE (account_nm, ord_key)
);

CREATE TABLE IF NOT EXISTS reports (
    report_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    rcept_no    TEXT NOT NULL UNIQUE CHECK (length(rcept_no) > 0),
    company_id  INTEGER NOT NULL REFERENCES companies(company_id) ON DELETE RESTRICT,
    reprt_code  TEXT NOT NULL,
    bsns_year   INTEGER NOT NULL CHECK (bsns_year BETWEEN 0 AND 9999),
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS financial_facts (
    fact_id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id               INTEGER NOT NULL REFERENCES reports(report_id) ON DELETE RESTRICT,
    statement_type_id       INTEGER NOT NULL REFERENCES statement_types(statement_type_id) ON DELETE RESTRICT,
    account_id              INTEGER NOT NULL REFERENCES accounts(account_id) ON DELETE RESTRICT,
    ord                     INTEGER,
    thstrm_nm               TEXT,
    thstrm_amount           TEXT,
    frmtrm_nm               TEXT,
    frmtrm_amount           TEXT,
    bfefrmtrm_nm            TEXT,
    bfefrmtrm_amount        TEXT,
    currency                TEXT NOT NULL,
    debt_ratio              TEXT,
    current_ratio           TEXT,
    debt_dependency         TEXT,
    equity_ratio            TEXT,
    operating_profit_ratio  TEXT,
    net_profit_ratio        TEXT,
    roe                     TEXT,
    roa                     TEXT,
    sales_growth            TEXT,
    operating_profit_growth TEXT,
    net_income_growth       TEXT,
    asset_growth            TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    UNIQUE (report_id, statement_type_id, account_id)
);

CREATE INDEX IF NOT EXISTS reports_company_idx ON reports(company_id);
CREATE INDEX IF NOT EXISTS facts_statement_idx ON financial_facts(statement_type_id);
CREATE INDEX IF NOT EXISTS facts_account_idx   ON financial_facts(account_id);

-- One row per ingestion run, committed or rejected.
CREATE TABLE IF NOT EXISTS ingest_batches (
    batch_id        TEXT PRIMARY KEY,
    started_at      TEXT NOT NULL,
    finished_at     TEXT NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('committed', 'rejected')),
    record_count    INTEGER NOT NULL,
    warning_count   INTEGER NOT NULL DEFAULT 0,
    failure_index   INTEGER,
    failure_reason  TEXT
);

CREATE INDEX IF NOT EXISTS batches_started_idx ON ingest_batches(started_at);

PRAGMA user_version = 1;
";
