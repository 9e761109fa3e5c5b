//! The ratio engine.
//!
//! Ratios are described by a fixed table mapping each [`RatioKind`] to a
//! [`Formula`] over [`AccountRole`]s. The engine resolves roles against the
//! facts of one report and evaluates every formula independently: a gap in one
//! ratio never prevents the others from being computed.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::config::IngestConfig;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// A semantic slot a ratio formula reads, mapped to concrete account names by
/// configuration.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
  Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountRole {
  TotalAssets,
  TotalLiabilities,
  TotalEquity,
  CurrentAssets,
  CurrentLiabilities,
  Revenue,
  OperatingProfit,
  NetIncome,
}

impl AccountRole {
  /// Statement divisions searched first when a name appears in several.
  pub fn statements(self) -> &'static [&'static str] {
    match self {
      Self::TotalAssets
      | Self::TotalLiabilities
      | Self::TotalEquity
      | Self::CurrentAssets
      | Self::CurrentLiabilities => &["BS"],
      Self::Revenue | Self::OperatingProfit | Self::NetIncome => &["IS", "CIS"],
    }
  }

  /// Built-in account labels (Korean DART labels, then English).
  pub fn default_names(self) -> &'static [&'static str] {
    match self {
      Self::TotalAssets => &["자산총계", "Total assets"],
      Self::TotalLiabilities => &["부채총계", "Total liabilities"],
      Self::TotalEquity => &["자본총계", "Total equity"],
      Self::CurrentAssets => &["유동자산", "Current assets"],
      Self::CurrentLiabilities => &["유동부채", "Current liabilities"],
      Self::Revenue => &["매출액", "수익(매출액)", "영업수익", "Revenue"],
      Self::OperatingProfit => &["영업이익", "영업이익(손실)", "Operating profit"],
      Self::NetIncome => &["당기순이익", "당기순이익(손실)", "Net income"],
    }
  }
}

// ─── Ratio table ─────────────────────────────────────────────────────────────

/// The twelve derived ratios carried on every fact row.
///
/// The snake_case name of each variant is also its column name.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
  Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RatioKind {
  DebtRatio,
  CurrentRatio,
  DebtDependency,
  EquityRatio,
  OperatingProfitRatio,
  NetProfitRatio,
  Roe,
  Roa,
  SalesGrowth,
  OperatingProfitGrowth,
  NetIncomeGrowth,
  AssetGrowth,
}

/// How a ratio is derived. All formulas yield percentages (scaled by 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
  /// `numerator / denominator × 100`, both read from the current period.
  Percent { numerator: AccountRole, denominator: AccountRole },
  /// Change of one account from the prior to the current period, in percent.
  Growth(AccountRole),
}

impl Formula {
  pub fn roles(self) -> Vec<AccountRole> {
    match self {
      Self::Percent { numerator, denominator } => vec![numerator, denominator],
      Self::Growth(role) => vec![role],
    }
  }
}

const fn percent(numerator: AccountRole, denominator: AccountRole) -> Formula {
  Formula::Percent { numerator, denominator }
}

/// Every ratio and its formula. Adding a ratio means adding a row here and a
/// variant to [`RatioKind`].
pub const RATIOS: [(RatioKind, Formula); 12] = {
  use AccountRole::*;
  [
    (RatioKind::DebtRatio, percent(TotalLiabilities, TotalEquity)),
    (RatioKind::CurrentRatio, percent(CurrentAssets, CurrentLiabilities)),
    (RatioKind::DebtDependency, percent(TotalLiabilities, TotalAssets)),
    (RatioKind::EquityRatio, percent(TotalEquity, TotalAssets)),
    (RatioKind::OperatingProfitRatio, percent(OperatingProfit, Revenue)),
    (RatioKind::NetProfitRatio, percent(NetIncome, Revenue)),
    (RatioKind::Roe, percent(NetIncome, TotalEquity)),
    (RatioKind::Roa, percent(NetIncome, TotalAssets)),
    (RatioKind::SalesGrowth, Formula::Growth(Revenue)),
    (RatioKind::OperatingProfitGrowth, Formula::Growth(OperatingProfit)),
    (RatioKind::NetIncomeGrowth, Formula::Growth(NetIncome)),
    (RatioKind::AssetGrowth, Formula::Growth(TotalAssets)),
  ]
};

impl RatioKind {
  pub fn formula(self) -> Formula {
    RATIOS
      .iter()
      .find(|(kind, _)| *kind == self)
      .map(|(_, formula)| *formula)
      .unwrap_or_else(|| unreachable!("every ratio kind has a row in RATIOS"))
  }

  pub fn column(self) -> &'static str { self.into() }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// Computed ratios for one report; absent kinds are null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ratios(BTreeMap<RatioKind, Decimal>);

impl Ratios {
  pub fn get(&self, kind: RatioKind) -> Option<Decimal> { self.0.get(&kind).copied() }

  pub fn set(&mut self, kind: RatioKind, value: Option<Decimal>) {
    match value {
      Some(v) => self.0.insert(kind, v),
      None => self.0.remove(&kind),
    };
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (RatioKind, Decimal)> + '_ {
    self.0.iter().map(|(k, v)| (*k, *v))
  }
}

/// The amounts of one account as seen by the engine.
#[derive(Debug, Clone, Copy)]
pub struct AccountAmounts<'a> {
  pub sj_div:     &'a str,
  pub account_nm: &'a str,
  pub current:    Option<Decimal>,
  pub prior:      Option<Decimal>,
}

// ─── Warnings ────────────────────────────────────────────────────────────────

/// Why a ratio was left null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
  /// No fact in the report matches any name configured for the role.
  MissingAccount,
  /// The account exists but the current-period amount is null.
  MissingCurrentAmount,
  /// The account exists but the prior-period amount is null.
  MissingPriorAmount,
  /// The divisor is zero.
  ZeroDenominator,
  /// The result does not fit a decimal.
  Overflow,
}

/// A ratio that could not be computed; attached to the batch outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioWarning {
  pub rcept_no: String,
  pub ratio:    RatioKind,
  pub role:     AccountRole,
  pub reason:   GapReason,
}

impl std::fmt::Display for RatioWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "report {}: {} left null ({} {:?})",
      self.rcept_no, self.ratio, self.role, self.reason
    )
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Result of evaluating the ratio table over one report.
#[derive(Debug, Clone, Default)]
pub struct RatioReport {
  pub ratios:   Ratios,
  pub warnings: Vec<RatioWarning>,
}

/// Evaluates [`RATIOS`] against the facts of one report.
#[derive(Debug, Clone, Copy)]
pub struct RatioEngine<'c> {
  config: &'c IngestConfig,
}

impl<'c> RatioEngine<'c> {
  pub fn new(config: &'c IngestConfig) -> Self { Self { config } }

  /// Compute every ratio for the report `rcept_no` from its `accounts`.
  pub fn compute(&self, rcept_no: &str, accounts: &[AccountAmounts<'_>]) -> RatioReport {
    let mut report = RatioReport::default();

    for (kind, formula) in RATIOS {
      match self.evaluate(formula, accounts) {
        Ok(value) => report.ratios.set(kind, Some(value)),
        Err((role, reason)) => report.warnings.push(RatioWarning {
          rcept_no: rcept_no.to_owned(),
          ratio: kind,
          role,
          reason,
        }),
      }
    }

    report
  }

  fn evaluate(
    &self,
    formula: Formula,
    accounts: &[AccountAmounts<'_>],
  ) -> Result<Decimal, (AccountRole, GapReason)> {
    let raw = match formula {
      Formula::Percent { numerator, denominator } => {
        let num = self.current(numerator, accounts)?;
        let den = self.current(denominator, accounts)?;
        percent_of(num, den).map_err(|reason| (denominator, reason))?
      }
      Formula::Growth(role) => {
        let cur = self.current(role, accounts)?;
        let prev = self
          .lookup(role, accounts)?
          .prior
          .ok_or((role, GapReason::MissingPriorAmount))?;
        growth(cur, prev).map_err(|reason| (role, reason))?
      }
    };

    Ok(self.round(raw))
  }

  fn current(
    &self,
    role: AccountRole,
    accounts: &[AccountAmounts<'_>],
  ) -> Result<Decimal, (AccountRole, GapReason)> {
    self
      .lookup(role, accounts)?
      .current
      .ok_or((role, GapReason::MissingCurrentAmount))
  }

  /// Find the fact filling `role`, preferring the role's own statements.
  fn lookup<'a, 'b>(
    &self,
    role: AccountRole,
    accounts: &'b [AccountAmounts<'a>],
  ) -> Result<&'b AccountAmounts<'a>, (AccountRole, GapReason)> {
    let names = self.config.role_names(role);
    let matches = |a: &&AccountAmounts<'_>| {
      let name = a.account_nm.trim();
      names.iter().any(|n| n.trim().eq_ignore_ascii_case(name))
    };

    accounts
      .iter()
      .filter(matches)
      .find(|a| role.statements().iter().any(|s| *s == a.sj_div))
      .or_else(|| accounts.iter().find(matches))
      .ok_or((role, GapReason::MissingAccount))
  }

  fn round(&self, value: Decimal) -> Decimal {
    let places = self.config.ratio_decimal_places;
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded
  }
}

fn percent_of(num: Decimal, den: Decimal) -> Result<Decimal, GapReason> {
  if den.is_zero() {
    return Err(GapReason::ZeroDenominator);
  }
  num
    .checked_div(den)
    .and_then(|q| q.checked_mul(Decimal::ONE_HUNDRED))
    .ok_or(GapReason::Overflow)
}

/// Period-over-period growth. A sign flip reports ±100 rather than a
/// meaningless magnitude.
fn growth(current: Decimal, prior: Decimal) -> Result<Decimal, GapReason> {
  if prior.is_zero() {
    return Err(GapReason::ZeroDenominator);
  }
  if prior.is_sign_negative() && current > Decimal::ZERO {
    return Ok(Decimal::ONE_HUNDRED);
  }
  if prior > Decimal::ZERO && current.is_sign_negative() && !current.is_zero() {
    return Ok(-Decimal::ONE_HUNDRED);
  }
  current
    .checked_sub(prior)
    .and_then(|delta| delta.checked_div(prior.abs()))
    .and_then(|q| q.checked_mul(Decimal::ONE_HUNDRED))
    .ok_or(GapReason::Overflow)
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use strum::IntoEnumIterator as _;

  use super::*;

  fn amounts<'a>(
    sj_div: &'a str,
    account_nm: &'a str,
    current: i64,
    prior: Option<i64>,
  ) -> AccountAmounts<'a> {
    AccountAmounts {
      sj_div,
      account_nm,
      current: Some(Decimal::from(current)),
      prior: prior.map(Decimal::from),
    }
  }

  fn dec(s: &str) -> Decimal { Decimal::from_str(s).unwrap() }

  #[test]
  fn table_covers_every_kind_once() {
    for kind in RatioKind::iter() {
      assert_eq!(RATIOS.iter().filter(|(k, _)| *k == kind).count(), 1, "{kind}");
    }
  }

  #[test]
  fn column_names_are_snake_case() {
    assert_eq!(RatioKind::DebtRatio.column(), "debt_ratio");
    assert_eq!(RatioKind::Roe.column(), "roe");
    assert_eq!(RatioKind::OperatingProfitGrowth.column(), "operating_profit_growth");
  }

  #[test]
  fn debt_ratio_is_percent_of_equity() {
    let cfg = IngestConfig::default();
    let facts = [
      amounts("BS", "Total liabilities", 600, None),
      amounts("BS", "Total equity", 300, None),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);

    let debt = report.ratios.get(RatioKind::DebtRatio).unwrap();
    assert_eq!(debt, dec("200"));
    assert_eq!(debt.to_string(), "200.0000");
  }

  #[test]
  fn zero_equity_leaves_ratio_null_with_warning() {
    let cfg = IngestConfig::default();
    let facts = [
      amounts("BS", "Total liabilities", 600, None),
      amounts("BS", "Total equity", 0, None),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);

    assert_eq!(report.ratios.get(RatioKind::DebtRatio), None);
    assert!(report.warnings.contains(&RatioWarning {
      rcept_no: "R1".into(),
      ratio:    RatioKind::DebtRatio,
      role:     AccountRole::TotalEquity,
      reason:   GapReason::ZeroDenominator,
    }));
  }

  #[test]
  fn missing_accounts_do_not_block_other_ratios() {
    let cfg = IngestConfig::default();
    let facts = [
      amounts("IS", "매출액", 1_000, Some(800)),
      amounts("IS", "영업이익", 150, Some(100)),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);

    assert_eq!(report.ratios.get(RatioKind::OperatingProfitRatio), Some(dec("15")));
    assert_eq!(report.ratios.get(RatioKind::SalesGrowth), Some(dec("25")));
    assert_eq!(report.ratios.get(RatioKind::OperatingProfitGrowth), Some(dec("50")));
    assert_eq!(report.ratios.len(), 3);
    assert_eq!(report.warnings.len(), 9);
    assert!(report.warnings.iter().any(|w| {
      w.ratio == RatioKind::NetProfitRatio
        && w.role == AccountRole::NetIncome
        && w.reason == GapReason::MissingAccount
    }));
  }

  #[test]
  fn growth_handles_sign_flips() {
    assert_eq!(growth(dec("50"), dec("-20")).unwrap(), dec("100"));
    assert_eq!(growth(dec("-50"), dec("20")).unwrap(), dec("-100"));
    assert_eq!(growth(dec("-30"), dec("-20")).unwrap(), dec("-50"));
    assert_eq!(growth(dec("1"), dec("0")).unwrap_err(), GapReason::ZeroDenominator);
  }

  #[test]
  fn missing_prior_amount_is_reported() {
    let cfg = IngestConfig::default();
    let facts = [amounts("IS", "Revenue", 1_000, None)];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);

    assert_eq!(report.ratios.get(RatioKind::SalesGrowth), None);
    assert!(report.warnings.iter().any(|w| {
      w.ratio == RatioKind::SalesGrowth && w.reason == GapReason::MissingPriorAmount
    }));
  }

  #[test]
  fn rounds_half_away_from_zero() {
    let cfg = IngestConfig { ratio_decimal_places: 2, ..Default::default() };
    let facts = [
      amounts("IS", "Net income", 1, None),
      amounts("IS", "Revenue", 8, None),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);
    // 1 / 8 × 100 = 12.5 exactly
    assert_eq!(report.ratios.get(RatioKind::NetProfitRatio).unwrap().to_string(), "12.50");

    let facts = [
      amounts("IS", "Net income", 1, None),
      amounts("IS", "Revenue", 3, None),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);
    assert_eq!(report.ratios.get(RatioKind::NetProfitRatio), Some(dec("33.33")));
  }

  #[test]
  fn prefers_account_from_role_statement() {
    let cfg = IngestConfig::default();
    // The same label can appear on the cash-flow statement.
    let facts = [
      amounts("CF", "Net income", 999, None),
      amounts("IS", "Net income", 50, None),
      amounts("IS", "Revenue", 500, None),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);
    assert_eq!(report.ratios.get(RatioKind::NetProfitRatio), Some(dec("10")));
  }

  #[test]
  fn role_names_come_from_config() {
    let mut cfg = IngestConfig::default();
    cfg.account_roles.insert(AccountRole::Revenue, vec!["Net sales".into()]);
    let facts = [
      amounts("IS", "Net sales", 200, Some(100)),
      amounts("IS", "Revenue", 1, Some(1)),
    ];
    let report = RatioEngine::new(&cfg).compute("R1", &facts);
    assert_eq!(report.ratios.get(RatioKind::SalesGrowth), Some(dec("100")));
  }
}
