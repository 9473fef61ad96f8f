use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::db::models::{CategoryTotalRow, PeerSpend, UserProfile};
use crate::db::source::{GroupFilter, SpendingSource, TimeRange};
use crate::error::Result;
use crate::types::SpendCategory;

/// Open (creating if needed) the database file and apply migrations.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn push_group_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &GroupFilter) {
    match filter {
        GroupFilter::State(state) => {
            qb.push(" AND UPPER(u.state) = ").push_bind(state.clone());
        }
        GroupFilter::City(city) => {
            qb.push(" AND LOWER(u.city) = LOWER(").push_bind(city.clone()).push(")");
        }
        GroupFilter::Gender(gender) => {
            qb.push(" AND LOWER(u.gender) = LOWER(").push_bind(gender.clone()).push(")");
        }
        GroupFilter::Age { min, max } => {
            qb.push(" AND u.age >= ").push_bind(*min);
            if let Some(max) = max {
                qb.push(" AND u.age <= ").push_bind(*max);
            }
        }
    }
}

impl SpendingSource for SqliteSource {
    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, name, gender, city, state, age, salary
            FROM users
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn category_totals(&self, user_id: &str, range: TimeRange) -> Result<Vec<(String, f64)>> {
        let rows = sqlx::query_as::<_, CategoryTotalRow>(
            r#"
            SELECT category, CAST(SUM(amount) AS REAL) AS total
            FROM transactions
            WHERE user_id = ? AND unix_time > ? AND unix_time <= ?
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        debug!(user_id, categories = rows.len(), "category totals loaded");
        Ok(rows.into_iter().map(|r| (r.category, r.total)).collect())
    }

    async fn peer_spend(
        &self,
        category: SpendCategory,
        range: TimeRange,
        filter: Option<&GroupFilter>,
    ) -> Result<Vec<PeerSpend>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            r#"
            SELECT t.user_id AS user_id,
                   CAST(SUM(CASE WHEN t.category = "#,
        );
        qb.push_bind(category.as_str());
        qb.push(
            r#" THEN t.amount ELSE 0.0 END) AS REAL) AS category_amount,
                   CAST(SUM(t.amount) AS REAL) AS total_amount
            FROM transactions t
            JOIN users u ON u.user_id = t.user_id
            WHERE t.unix_time > "#,
        );
        qb.push_bind(range.start);
        qb.push(" AND t.unix_time <= ");
        qb.push_bind(range.end);
        if let Some(filter) = filter {
            push_group_filter(&mut qb, filter);
        }
        qb.push(" GROUP BY t.user_id HAVING category_amount > 0 ORDER BY t.user_id");

        let rows = qb.build_query_as::<PeerSpend>().fetch_all(&self.pool).await?;
        debug!(category = %category, peers = rows.len(), "peer spend loaded");
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::record;
    use crate::db::import::store_records;
    use crate::types::GroupBy;

    async fn seeded() -> SqliteSource {
        let pool = connect_in_memory().await.unwrap();
        let records = vec![
            record("alice", "PA", 30, 1_000, "grocery", 40.0),
            record("alice", "PA", 30, 1_500, "grocery_pos", 10.0),
            record("alice", "PA", 30, 1_600, "travel", 50.0),
            record("bob", "NY", 41, 1_200, "grocery_net", 5.0),
            record("bob", "NY", 41, 1_300, "home", 95.0),
            record("carol", "PA", 22, 1_400, "home", 10.0),
            // outside the window
            record("carol", "PA", 22, 100, "grocery", 999.0),
        ];
        store_records(&pool, &records, false).await.unwrap();
        SqliteSource::new(pool)
    }

    fn range() -> TimeRange {
        TimeRange { start: 500, end: 2_000 }
    }

    #[tokio::test]
    async fn loads_user_profile() {
        let source = seeded().await;
        let alice = source.user("alice").await.unwrap().unwrap();
        assert_eq!(alice.state.as_deref(), Some("PA"));
        assert_eq!(alice.salary, Some(73_000.0));
        assert!(source.user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn totals_are_grouped_per_category_inside_window() {
        let source = seeded().await;
        let totals = source.category_totals("alice", range()).await.unwrap();
        assert_eq!(totals, vec![("grocery".to_string(), 50.0), ("travel".to_string(), 50.0)]);

        let carol = source.category_totals("carol", range()).await.unwrap();
        assert_eq!(carol, vec![("home".to_string(), 10.0)]);
    }

    #[tokio::test]
    async fn peers_without_category_spend_are_excluded() {
        let source = seeded().await;
        let peers = source
            .peer_spend(SpendCategory::Grocery, range(), None)
            .await
            .unwrap();
        let ids: Vec<_> = peers.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, ["alice", "bob"]);
        assert_eq!(peers[0].spent_ratio(), 0.5);
        assert_eq!(peers[1].spent_ratio(), 0.05);
    }

    #[tokio::test]
    async fn group_filters_narrow_population() {
        let source = seeded().await;
        let pa = GroupFilter::from_query(Some(GroupBy::State), Some("pa")).unwrap();
        let peers = source
            .peer_spend(SpendCategory::Grocery, range(), pa.as_ref())
            .await
            .unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].user_id, "alice");

        let forties = GroupFilter::Age { min: 35, max: Some(44) };
        let peers = source
            .peer_spend(SpendCategory::Home, range(), Some(&forties))
            .await
            .unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].user_id, "bob");
    }

    #[tokio::test]
    async fn ping_succeeds() {
        seeded().await.ping().await.unwrap();
    }
}
