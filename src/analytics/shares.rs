//! Category → amount maps turned into ordered pie rows.
//!
//! Lossy but available: malformed amounts (NaN, ±inf, ≤ 0) are dropped
//! instead of failing the whole aggregation.

use serde::Serialize;

use crate::config::RESERVED_KEYS;
use crate::types::CategoryAmount;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShares {
    /// Sorted by amount, largest first; equal amounts keep input order.
    pub rows: Vec<CategoryAmount>,
    /// Reference total exactly as supplied (0 when it was not finite).
    pub total: f64,
}

impl CategoryShares {
    pub fn top(&self, n: usize) -> &[CategoryAmount] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn proportion_sum(&self) -> f64 {
        self.rows.iter().map(|r| r.proportion).sum()
    }

    /// Rows large enough to carry a label in the pie strip.
    pub fn labelled(&self, min_share: f64) -> impl Iterator<Item = &CategoryAmount> {
        self.rows.iter().filter(move |r| r.proportion >= min_share)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key))
}

/// Build proportioned, filtered, sorted rows.
///
/// `total` is supplied separately and need not equal the sum of `amounts`
/// (budget-padded totals make the proportions sum to less than 1).
pub fn aggregate<S: AsRef<str>>(amounts: &[(S, f64)], total: f64) -> CategoryShares {
    let total = if total.is_finite() { total } else { 0.0 };

    let mut rows: Vec<CategoryAmount> = amounts
        .iter()
        .filter(|(category, _)| !is_reserved(category.as_ref()))
        .filter(|(_, amount)| amount.is_finite() && *amount > 0.0)
        .map(|(category, amount)| CategoryAmount {
            category: category.as_ref().to_string(),
            amount: *amount,
            proportion: if total > 0.0 { amount / total } else { 0.0 },
        })
        .collect();

    // sort_by is stable, so ties keep their input order.
    rows.sort_by(|a, b| b.amount.total_cmp(&a.amount));

    CategoryShares { rows, total }
}
