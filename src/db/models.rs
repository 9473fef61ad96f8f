/// Database row types matching `migrations/0001_init.sql`.
/// Used by sqlx for typed queries.
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub age: Option<i64>,
    /// Annual salary; the window budget is prorated from it.
    pub salary: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryTotalRow {
    pub category: String,
    pub total: f64,
}

/// One peer's spend in a window: the ranked category and everything.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PeerSpend {
    pub user_id: String,
    pub category_amount: f64,
    pub total_amount: f64,
}

impl PeerSpend {
    /// Share of the peer's window spend that went to the ranked category.
    pub fn spent_ratio(&self) -> f64 {
        if self.total_amount > 0.0 {
            self.category_amount / self.total_amount
        } else {
            0.0
        }
    }
}

/// One line of the cleaned transaction CSV. Unlisted columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionRecord {
    pub user_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub age: Option<i64>,
    pub salary: Option<f64>,
    pub unix_time: i64,
    pub category: String,
    #[serde(rename = "amt")]
    pub amount: f64,
}
