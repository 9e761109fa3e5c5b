//! Raw disclosure records and their validated views.
//!
//! A [`RawRecord`] is one denormalized row as delivered by the disclosure API:
//! every row repeats the company, report and account text. The pipeline splits
//! it into a [`FilingHeader`] (report + company) and a [`LineItem`]
//! (statement + account + amounts), validating each field on the way.

use std::str::FromStr as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
  Error, Result,
  config::IngestConfig,
  fact::PeriodAmount,
};

// ─── Raw record ──────────────────────────────────────────────────────────────

/// One denormalized disclosure row. Every field is text; missing or `null`
/// fields decode as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
  #[serde(default, deserialize_with = "text")]
  pub corp_code:        String,
  #[serde(default, deserialize_with = "text")]
  pub corp_name:        String,
  #[serde(default, deserialize_with = "text")]
  pub stock_code:       String,
  #[serde(default, deserialize_with = "text")]
  pub rcept_no:         String,
  #[serde(default, deserialize_with = "text")]
  pub reprt_code:       String,
  #[serde(default, deserialize_with = "text")]
  pub bsns_year:        String,
  #[serde(default, deserialize_with = "text")]
  pub sj_div:           String,
  #[serde(default, deserialize_with = "text")]
  pub sj_nm:            String,
  #[serde(default, deserialize_with = "text")]
  pub account_nm:       String,
  #[serde(default, deserialize_with = "text")]
  pub ord:              String,
  #[serde(default, deserialize_with = "text")]
  pub thstrm_nm:        String,
  #[serde(default, deserialize_with = "text")]
  pub thstrm_amount:    String,
  #[serde(default, deserialize_with = "text")]
  pub frmtrm_nm:        String,
  #[serde(default, deserialize_with = "text")]
  pub frmtrm_amount:    String,
  #[serde(default, deserialize_with = "text")]
  pub bfefrmtrm_nm:     String,
  #[serde(default, deserialize_with = "text")]
  pub bfefrmtrm_amount: String,
  #[serde(default, deserialize_with = "text")]
  pub currency:         String,
}

/// Accept strings, numbers or `null` for any text column.
fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Text {
    Str(String),
    Int(i64),
    Float(f64),
  }

  Ok(match Option::<Text>::deserialize(d)? {
    None => String::new(),
    Some(Text::Str(s)) => s,
    Some(Text::Int(i)) => i.to_string(),
    Some(Text::Float(f)) => f.to_string(),
  })
}

// ─── Validated views ─────────────────────────────────────────────────────────

/// The report-and-company part of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingHeader {
  pub rcept_no:   String,
  pub corp_code:  String,
  pub corp_name:  String,
  pub stock_code: Option<String>,
  pub reprt_code: String,
  pub bsns_year:  i32,
}

/// The statement-and-account part of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
  pub sj_div:      String,
  pub sj_nm:       String,
  pub account_nm:  String,
  pub ord:         Option<i64>,
  pub current:     PeriodAmount,
  pub prior:       PeriodAmount,
  pub prior_prior: PeriodAmount,
  /// Upper-cased ISO code, already checked against the allowed set.
  pub currency:    String,
}

impl RawRecord {
  /// Validate the filing header carried by this record.
  pub fn header(&self) -> Result<FilingHeader> {
    let rcept_no = natural_key("rcept_no", &self.rcept_no)?;
    let corp_code = natural_key("corp_code", &self.corp_code)?;

    Ok(FilingHeader {
      rcept_no,
      corp_code,
      corp_name: self.corp_name.trim().to_owned(),
      stock_code: non_empty(&self.stock_code),
      reprt_code: self.reprt_code.trim().to_owned(),
      bsns_year: parse_year(&self.bsns_year)?,
    })
  }

  /// Validate the line item carried by this record.
  pub fn line_item(&self, config: &IngestConfig) -> Result<LineItem> {
    let sj_div = natural_key("sj_div", &self.sj_div)?;
    let account_nm = natural_key("account_nm", &self.account_nm)?;

    let currency = self.currency.trim().to_ascii_uppercase();
    if !config.allowed_currencies.contains(&currency) {
      return Err(Error::validation(format!(
        "currency {:?} is not in the allowed set",
        self.currency
      )));
    }

    Ok(LineItem {
      sj_div,
      sj_nm: self.sj_nm.trim().to_owned(),
      account_nm,
      ord: parse_ord(&self.ord)?,
      current: PeriodAmount {
        label:  non_empty(&self.thstrm_nm),
        amount: parse_amount(&self.thstrm_amount)?,
      },
      prior: PeriodAmount {
        label:  non_empty(&self.frmtrm_nm),
        amount: parse_amount(&self.frmtrm_amount)?,
      },
      prior_prior: PeriodAmount {
        label:  non_empty(&self.bfefrmtrm_nm),
        amount: parse_amount(&self.bfefrmtrm_amount)?,
      },
      currency,
    })
  }
}

// ─── Field parsers ───────────────────────────────────────────────────────────

fn natural_key(field: &str, raw: &str) -> Result<String> {
  let key = raw.trim();
  if key.is_empty() {
    return Err(Error::integrity(format!("missing natural key `{field}`")));
  }
  if key.chars().any(char::is_control) {
    return Err(Error::integrity(format!(
      "natural key `{field}` contains control characters: {raw:?}"
    )));
  }
  Ok(key.to_owned())
}

fn non_empty(raw: &str) -> Option<String> {
  let s = raw.trim();
  (!s.is_empty()).then(|| s.to_owned())
}

/// Parse a business year; exactly four ASCII digits.
pub fn parse_year(raw: &str) -> Result<i32> {
  let s = raw.trim();
  if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
    return Err(Error::validation(format!(
      "bsns_year must be a 4-digit year, got {raw:?}"
    )));
  }
  s.parse()
    .map_err(|_| Error::validation(format!("bsns_year {raw:?} is not a number")))
}

/// Parse a presentation order; blank means absent.
pub fn parse_ord(raw: &str) -> Result<Option<i64>> {
  let s = raw.trim();
  if s.is_empty() {
    return Ok(None);
  }
  s.parse()
    .map(Some)
    .map_err(|_| Error::validation(format!("ord {raw:?} is not an integer")))
}

/// Parse a disclosed amount.
///
/// Thousands separators are ignored, `(1,000)` is read as `-1000`, and an
/// empty value or a lone `-` means the amount was not disclosed.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>> {
  let s = raw.trim();
  if s.is_empty() || s == "-" {
    return Ok(None);
  }

  let (negative, body) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
    Some(inner) => (true, inner.trim()),
    None => (false, s),
  };
  let digits: String = body.chars().filter(|c| *c != ',').collect();

  let value = Decimal::from_str(&digits)
    .map_err(|_| Error::validation(format!("amount {raw:?} is not numeric")))?;
  Ok(Some(if negative { -value } else { value }))
}

// ─── Batch documents ─────────────────────────────────────────────────────────

/// The envelope the disclosure API wraps its rows in.
#[derive(Deserialize)]
struct Envelope {
  list: Vec<RawRecord>,
}

/// Decode a batch document: a JSON array of records, an API envelope with a
/// `list` field, or newline-delimited JSON records.
pub fn parse_batch(input: &str) -> Result<Vec<RawRecord>> {
  let trimmed = input.trim_start();

  if trimmed.starts_with('[') {
    return Ok(serde_json::from_str(trimmed)?);
  }
  if let Ok(envelope) = serde_json::from_str::<Envelope>(trimmed) {
    return Ok(envelope.list);
  }

  serde_json::Deserializer::from_str(trimmed)
    .into_iter::<RawRecord>()
    .collect::<std::result::Result<Vec<_>, _>>()
    .map_err(Error::from)
}
