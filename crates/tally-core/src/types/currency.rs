//! Currency codes and amounts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed count of whole currency units.
///
/// Balances are permitted to go negative: transfers debit the sender
/// without a sufficiency check, and the ledger records the overdraft
/// rather than rejecting it.
pub type Amount = i64;

/// Free-form currency label, e.g. `"USD"`.
///
/// The ledger treats currencies as opaque strings; any non-empty label
/// names an independent balance dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    /// Wrap a currency label.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the label is empty (and therefore unusable in a transfer).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for CurrencyCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_transparently() {
        let code = CurrencyCode::new("USD");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"USD\"");
        let back: CurrencyCode = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn empty_label_is_flagged() {
        assert!(CurrencyCode::new("").is_empty());
        assert!(!CurrencyCode::new("EUR").is_empty());
    }
}
