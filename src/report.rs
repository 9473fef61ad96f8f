//! Request orchestration: pull numbers from a [`SpendingSource`] and run them
//! through the analytics core. One request in, one report out.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::leaderboard::{rank_population, PeerMetric};
use crate::analytics::locator::PercentilePlacement;
use crate::analytics::shares::{aggregate, CategoryShares};
use crate::db::source::{GroupFilter, SpendingSource, TimeRange};
use crate::error::{AppError, Result};
use crate::types::{BudgetStatus, LeaderboardRow, SpendCategory, TimeWindow};

#[derive(Debug, Clone)]
pub struct SpendingQuery {
    pub user_id: String,
    pub time: TimeWindow,
    pub reference: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingReport {
    pub shares: CategoryShares,
    pub total: f64,
    pub budget: f64,
    /// `budget - total`; see [`BudgetStatus`] for the sign convention.
    pub budget_delta: f64,
    pub budget_status: BudgetStatus,
    /// Category totals plus the `total` and `budget` figures, as loaded.
    pub raw: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct RankingQuery {
    pub user_id: String,
    pub category: SpendCategory,
    pub time: TimeWindow,
    pub reference: DateTime<Utc>,
    pub filter: Option<GroupFilter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub rows: Vec<LeaderboardRow>,
    pub user_spent_ratio: f64,
    pub user_rank: Option<u32>,
    pub num_users: usize,
    /// None when the subject has no spend in the category.
    pub top_percent: Option<f64>,
    pub placement: Option<PercentilePlacement>,
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Salary prorated to the window length.
pub fn window_budget(salary: Option<f64>, time: TimeWindow) -> f64 {
    match salary {
        Some(s) if s.is_finite() && s > 0.0 => round_cents(s * time.days() as f64 / 365.0),
        _ => 0.0,
    }
}

pub async fn spending_report<S: SpendingSource>(
    source: &S,
    query: &SpendingQuery,
) -> Result<SpendingReport> {
    let user = source
        .user(&query.user_id)
        .await?
        .ok_or_else(|| AppError::UnknownUser(query.user_id.clone()))?;

    let range = TimeRange::ending_at(query.reference, query.time);
    let totals = source.category_totals(&user.user_id, range).await?;

    let total = round_cents(totals.iter().map(|(_, a)| *a).filter(|a| a.is_finite()).sum());
    let budget = window_budget(user.salary, query.time);
    let budget_delta = round_cents(budget - total);

    let mut raw: BTreeMap<String, f64> = totals.into_iter().collect();
    raw.insert("total".to_string(), total);
    raw.insert("budget".to_string(), budget);

    let entries: Vec<(&str, f64)> = raw.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let shares = aggregate(&entries, total);

    Ok(SpendingReport {
        shares,
        total,
        budget,
        budget_delta,
        budget_status: BudgetStatus::from_delta(budget_delta),
        raw,
    })
}

pub async fn ranking_report<S: SpendingSource>(
    source: &S,
    query: &RankingQuery,
) -> Result<RankingReport> {
    if source.user(&query.user_id).await?.is_none() {
        return Err(AppError::UnknownUser(query.user_id.clone()));
    }

    let range = TimeRange::ending_at(query.reference, query.time);
    let peers = source
        .peer_spend(query.category, range, query.filter.as_ref())
        .await?;

    let metrics = peers
        .iter()
        .map(|p| PeerMetric { name: p.user_id.clone(), value: p.spent_ratio() })
        .collect();
    let population = rank_population(metrics, &query.user_id);

    let user_spent_ratio = population.subject().map_or(0.0, |e| e.metric_value);
    let top_percent = population.subject_top_percent();

    Ok(RankingReport {
        rows: population.window(),
        user_spent_ratio,
        user_rank: population.subject_rank,
        num_users: population.len(),
        top_percent,
        placement: top_percent.map(PercentilePlacement::from_top_percent),
    })
}
