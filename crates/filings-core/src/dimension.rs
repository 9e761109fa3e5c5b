//! Dimension entities: companies, statement types and accounts.
//!
//! Each dimension row is recognised by its natural key and owns a surrogate
//! identity assigned by the store. Identities never change once assigned.

use serde::{Deserialize, Serialize};

macro_rules! surrogate_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

surrogate_id!(
  /// Surrogate identity of a [`Company`].
  CompanyId
);
surrogate_id!(
  /// Surrogate identity of a [`StatementType`].
  StatementTypeId
);
surrogate_id!(
  /// Surrogate identity of an [`Account`].
  AccountId
);
surrogate_id!(
  /// Surrogate identity of a [`crate::report::Report`].
  ReportId
);
surrogate_id!(
  /// Surrogate identity of a [`crate::fact::FinancialFact`].
  FactId
);

/// A disclosing company, keyed by `corp_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
  pub company_id: CompanyId,
  pub corp_code:  String,
  /// Last value seen upstream.
  pub corp_name:  String,
  pub stock_code: Option<String>,
}

/// A financial statement division (`BS`, `IS`, `CIS`, `CF`, `SCE`, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementType {
  pub statement_type_id: StatementTypeId,
  pub sj_div:            String,
  pub sj_nm:             String,
}

/// An account label. See [`crate::config::AccountKeyMode`] for how `ord`
/// participates in its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub account_id: AccountId,
  pub account_nm: String,
  pub ord:        Option<i64>,
}
