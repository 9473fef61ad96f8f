use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::models::{PeerSpend, UserProfile};
use crate::error::{AppError, Result};
use crate::types::{GroupBy, SpendCategory, TimeWindow};

// ---------------------------------------------------------------------------
// Query inputs
// ---------------------------------------------------------------------------

/// Half-open window `(start, end]` in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn ending_at(reference: DateTime<Utc>, window: TimeWindow) -> Self {
        let end = reference.timestamp();
        Self { start: end - window.span_secs(), end }
    }

    pub fn contains(&self, unix_time: i64) -> bool {
        self.start < unix_time && unix_time <= self.end
    }
}

/// Restricts the ranked population to one group value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupFilter {
    State(String),
    City(String),
    Gender(String),
    /// Inclusive age bounds; `max` is open-ended for "65+".
    Age { min: i64, max: Option<i64> },
}

impl GroupFilter {
    /// Build a filter from the query's grouping dimension and value.
    ///
    /// No value means the whole population. District is accepted but the
    /// dataset has no district column, so it never filters.
    pub fn from_query(group: Option<GroupBy>, value: Option<&str>) -> Result<Option<Self>> {
        let (Some(group), Some(value)) = (group, value.map(str::trim).filter(|v| !v.is_empty()))
        else {
            return Ok(None);
        };

        let filter = match group {
            GroupBy::State => GroupFilter::State(value.to_ascii_uppercase()),
            GroupBy::City => GroupFilter::City(value.to_string()),
            GroupBy::Gender => GroupFilter::Gender(value.to_string()),
            GroupBy::Age => parse_age_bracket(value).ok_or_else(|| {
                AppError::InvalidRequest(format!("unrecognised age bracket '{value}'"))
            })?,
            GroupBy::District => {
                warn!(group_value = value, "District grouping has no data column; ignoring filter");
                return Ok(None);
            }
        };
        Ok(Some(filter))
    }

    pub fn matches(&self, user: &UserProfile) -> bool {
        match self {
            GroupFilter::State(s) => user.state.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(s)),
            GroupFilter::City(c) => user.city.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(c)),
            GroupFilter::Gender(g) => user.gender.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(g)),
            GroupFilter::Age { min, max } => user
                .age
                .is_some_and(|a| a >= *min && max.map_or(true, |m| a <= m)),
        }
    }
}

/// `<18`, `18-24` (hyphen or en dash), `65+`.
fn parse_age_bracket(label: &str) -> Option<GroupFilter> {
    let label = label.replace('–', "-");
    if let Some(upper) = label.strip_prefix('<') {
        let upper: i64 = upper.trim().parse().ok()?;
        if upper <= 0 {
            return None;
        }
        return Some(GroupFilter::Age { min: 0, max: Some(upper - 1) });
    }
    if let Some(lower) = label.strip_suffix('+') {
        let lower: i64 = lower.trim().parse().ok()?;
        if lower < 0 {
            return None;
        }
        return Some(GroupFilter::Age { min: lower, max: None });
    }
    let (lo, hi) = label.split_once('-')?;
    let (lo, hi): (i64, i64) = (lo.trim().parse().ok()?, hi.trim().parse().ok()?);
    (0 <= lo && lo <= hi).then_some(GroupFilter::Age { min: lo, max: Some(hi) })
}

// ---------------------------------------------------------------------------
// Repository seam
// ---------------------------------------------------------------------------

/// Where spending numbers come from. Implemented over SQLite in production
/// and over plain vectors in tests.
pub trait SpendingSource: Send + Sync + 'static {
    fn user(&self, user_id: &str) -> impl Future<Output = Result<Option<UserProfile>>> + Send;

    /// Per-category totals for one user inside `range`.
    fn category_totals(
        &self,
        user_id: &str,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<(String, f64)>>> + Send;

    /// Every user with spend in `category` inside `range`, optionally narrowed
    /// to a group.
    fn peer_spend(
        &self,
        category: SpendCategory,
        range: TimeRange,
        filter: Option<&GroupFilter>,
    ) -> impl Future<Output = Result<Vec<PeerSpend>>> + Send;

    /// Liveness check for /health.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(age: Option<i64>) -> UserProfile {
        UserProfile {
            user_id: "EuLe21".into(),
            name: "Eugene Lee".into(),
            gender: Some("F".into()),
            city: Some("Philadelphia".into()),
            state: Some("PA".into()),
            age,
            salary: Some(90_000.0),
        }
    }

    #[test]
    fn range_is_half_open_and_window_sized() {
        let reference = Utc.with_ymd_and_hms(2019, 2, 15, 0, 0, 0).unwrap();
        let week = TimeRange::ending_at(reference, TimeWindow::Week);
        assert_eq!(week.end - week.start, 7 * 86_400);
        assert!(week.contains(week.end));
        assert!(!week.contains(week.start));
    }

    #[test]
    fn state_filter_is_uppercased() {
        let f = GroupFilter::from_query(Some(GroupBy::State), Some(" pa ")).unwrap();
        assert_eq!(f, Some(GroupFilter::State("PA".into())));
        assert!(f.unwrap().matches(&user(Some(30))));
    }

    #[test]
    fn missing_value_or_district_means_no_filter() {
        assert_eq!(GroupFilter::from_query(Some(GroupBy::City), None).unwrap(), None);
        assert_eq!(GroupFilter::from_query(Some(GroupBy::City), Some("  ")).unwrap(), None);
        assert_eq!(GroupFilter::from_query(Some(GroupBy::District), Some("D1")).unwrap(), None);
        assert_eq!(GroupFilter::from_query(None, Some("PA")).unwrap(), None);
    }

    #[test]
    fn age_brackets_parse() {
        let parse = |s: &str| GroupFilter::from_query(Some(GroupBy::Age), Some(s)).unwrap().unwrap();
        assert_eq!(parse("<18"), GroupFilter::Age { min: 0, max: Some(17) });
        assert_eq!(parse("18–24"), GroupFilter::Age { min: 18, max: Some(24) });
        assert_eq!(parse("65+"), GroupFilter::Age { min: 65, max: None });
        assert!(GroupFilter::from_query(Some(GroupBy::Age), Some("old")).is_err());
        assert!(GroupFilter::from_query(Some(GroupBy::Age), Some("40-30")).is_err());
    }

    #[test]
    fn age_brackets_reject_negative_and_extreme_bounds() {
        for label in ["<-9223372036854775808", "<0", "-5+", "<99999999999999999999"] {
            assert!(
                GroupFilter::from_query(Some(GroupBy::Age), Some(label)).is_err(),
                "{label} should be rejected"
            );
        }
        assert_eq!(
            GroupFilter::from_query(Some(GroupBy::Age), Some("<9223372036854775807")).unwrap(),
            Some(GroupFilter::Age { min: 0, max: Some(i64::MAX - 1) })
        );
    }

    #[test]
    fn age_filter_matches_bounds() {
        let f = GroupFilter::Age { min: 25, max: Some(34) };
        assert!(f.matches(&user(Some(25))));
        assert!(f.matches(&user(Some(34))));
        assert!(!f.matches(&user(Some(35))));
        assert!(!f.matches(&user(None)));
    }
}
