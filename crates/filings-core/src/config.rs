//! Pipeline configuration.
//!
//! Every field has a default so an empty `[ingest]` table (or none at all) is
//! a valid configuration.

use std::{
  collections::{BTreeMap, BTreeSet},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::{Error, Result, ratio::AccountRole};

/// How an account's natural key is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKeyMode {
  /// `account_nm` alone; `ord` is a mutable attribute refreshed per report.
  #[default]
  Name,
  /// `(account_nm, ord)`; a changed order creates a new account variant.
  NameAndOrder,
}

/// Options recognised by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  /// Reject an existing (report, statement type, account) key instead of
  /// overwriting it.
  pub strict_fact_insert:   bool,
  /// Fractional digits kept on computed ratios.
  pub ratio_decimal_places: u32,
  /// ISO currency codes accepted on line items.
  pub allowed_currencies:   BTreeSet<String>,
  /// Maximum wall-clock duration of one batch, in seconds.
  #[serde(with = "seconds")]
  pub batch_timeout:        Duration,
  pub account_key:          AccountKeyMode,
  /// Account names that fill each role read by the ratio formulas.
  pub account_roles:        BTreeMap<AccountRole, Vec<String>>,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      strict_fact_insert:   false,
      ratio_decimal_places: 4,
      allowed_currencies:   ["KRW", "USD", "EUR", "JPY", "CNY"]
        .into_iter()
        .map(str::to_owned)
        .collect(),
      batch_timeout:        Duration::from_secs(30),
      account_key:          AccountKeyMode::default(),
      account_roles:        AccountRole::iter()
        .map(|role| {
          let names = role.default_names().iter().map(|n| (*n).to_owned()).collect();
          (role, names)
        })
        .collect(),
    }
  }
}

impl IngestConfig {
  /// Largest scale a `Decimal` can carry.
  pub const MAX_DECIMAL_PLACES: u32 = 28;

  /// Check ranges and normalise currency codes to upper case.
  pub fn validate(mut self) -> Result<Self> {
    if self.ratio_decimal_places > Self::MAX_DECIMAL_PLACES {
      return Err(Error::validation(format!(
        "ratio_decimal_places must be at most {}, got {}",
        Self::MAX_DECIMAL_PLACES,
        self.ratio_decimal_places
      )));
    }

    self.allowed_currencies = self
      .allowed_currencies
      .into_iter()
      .map(|c| c.trim().to_ascii_uppercase())
      .filter(|c| !c.is_empty())
      .collect();
    if self.allowed_currencies.is_empty() {
      return Err(Error::validation("allowed_currencies must not be empty"));
    }

    // Roles missing from a partial table keep their defaults.
    for role in AccountRole::iter() {
      self.account_roles.entry(role).or_insert_with(|| {
        role.default_names().iter().map(|n| (*n).to_owned()).collect()
      });
    }

    Ok(self)
  }

  /// Account names configured for `role`.
  pub fn role_names(&self, role: AccountRole) -> &[String] {
    self.account_roles.get(&role).map(Vec::as_slice).unwrap_or_default()
  }
}

/// (De)serialise a [`Duration`] as a number of seconds.
mod seconds {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(d)?;
    Duration::try_from_secs_f64(secs)
      .map_err(|e| D::Error::custom(format!("invalid batch_timeout {secs}: {e}")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_cover_every_role() {
    let cfg = IngestConfig::default();
    for role in AccountRole::iter() {
      assert!(!cfg.role_names(role).is_empty(), "{role} has no names");
    }
    assert_eq!(cfg.ratio_decimal_places, 4);
    assert!(cfg.allowed_currencies.contains("KRW"));
  }

  #[test]
  fn partial_document_keeps_defaults() {
    let cfg: IngestConfig = serde_json::from_str(
      r#"{"strict_fact_insert": true, "batch_timeout": 2.5,
          "allowed_currencies": ["usd"],
          "account_roles": {"revenue": ["Sales"]}}"#,
    )
    .unwrap();
    let cfg = cfg.validate().unwrap();

    assert!(cfg.strict_fact_insert);
    assert_eq!(cfg.batch_timeout, Duration::from_millis(2500));
    assert_eq!(cfg.allowed_currencies.iter().collect::<Vec<_>>(), ["USD"]);
    assert_eq!(cfg.role_names(AccountRole::Revenue), ["Sales"]);
    assert!(!cfg.role_names(AccountRole::TotalEquity).is_empty());
    assert_eq!(cfg.account_key, AccountKeyMode::Name);
  }

  #[test]
  fn rejects_out_of_range_precision() {
    let cfg = IngestConfig { ratio_decimal_places: 40, ..Default::default() };
    assert!(matches!(cfg.validate().unwrap_err(), Error::Validation(_)));
  }

  #[test]
  fn rejects_empty_currency_set() {
    let cfg = IngestConfig { allowed_currencies: BTreeSet::new(), ..Default::default() };
    assert!(matches!(cfg.validate().unwrap_err(), Error::Validation(_)));
  }
}
