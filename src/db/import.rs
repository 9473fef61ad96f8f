//! Load the cleaned credit-card transaction CSV into SQLite.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::models::TransactionRecord;
use crate::error::Result;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub users: usize,
    pub transactions: usize,
}

/// `grocery_pos` / `shopping_net` → `grocery` / `shopping`.
pub fn strip_channel_suffix(category: &str) -> String {
    category
        .strip_suffix("_pos")
        .or_else(|| category.strip_suffix("_net"))
        .unwrap_or(category)
        .to_string()
}

/// Parse CSV rows. Rows that fail to deserialize are counted and skipped.
pub fn read_records<R: Read>(reader: R) -> Result<(Vec<TransactionRecord>, usize)> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in rdr.deserialize::<TransactionRecord>().enumerate() {
        match row {
            Ok(mut rec) if rec.amount.is_finite() && !rec.user_id.is_empty() => {
                rec.category = strip_channel_suffix(&rec.category);
                records.push(rec);
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!(line = line + 2, "skipping malformed row: {e}");
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

/// Upsert users and insert transactions in a single database transaction.
/// With `replace`, existing transactions are deleted first.
pub async fn store_records(
    pool: &SqlitePool,
    records: &[TransactionRecord],
    replace: bool,
) -> Result<(usize, usize)> {
    let mut tx = pool.begin().await?;

    if replace {
        sqlx::query("DELETE FROM transactions").execute(&mut *tx).await?;
    }

    let mut seen_users = HashSet::new();
    for rec in records {
        if seen_users.insert(rec.user_id.as_str()) {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, name, gender, city, state, age, salary)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id) DO UPDATE SET
                    name = excluded.name,
                    gender = excluded.gender,
                    city = excluded.city,
                    state = excluded.state,
                    age = excluded.age,
                    salary = excluded.salary
                "#,
            )
            .bind(&rec.user_id)
            .bind(&rec.name)
            .bind(&rec.gender)
            .bind(&rec.city)
            .bind(&rec.state)
            .bind(rec.age)
            .bind(rec.salary)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, unix_time, category, amount)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&rec.user_id)
        .bind(rec.unix_time)
        .bind(&rec.category)
        .bind(rec.amount)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((seen_users.len(), records.len()))
}

pub async fn import_csv(pool: &SqlitePool, path: &Path, replace: bool) -> Result<ImportStats> {
    let file = std::fs::File::open(path)?;
    let (records, rows_skipped) = read_records(file)?;
    info!(
        path = %path.display(),
        rows = records.len(),
        skipped = rows_skipped,
        "CSV parsed"
    );

    let (users, transactions) = store_records(pool, &records, replace).await?;
    Ok(ImportStats {
        rows_read: records.len() + rows_skipped,
        rows_skipped,
        users,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::connect_in_memory;

    const CSV: &str = "\
category,amt,gender,city,state,unix_time,age,user_id,name,salary,trans_num
grocery_pos,12.50,F,Altoona,PA,1549000000,41,EuLe41,Eugene Lee,88000,abc
shopping_net,30.00,F,Altoona,PA,1549100000,41,EuLe41,Eugene Lee,88000,def
travel,not-a-number,M,Boston,MA,1549100000,30,JoSm30,John Smith,52000,ghi
home,7.25,M,Boston,MA,1549200000,30,JoSm30,John Smith,,jkl
";

    #[test]
    fn suffixes_are_stripped() {
        assert_eq!(strip_channel_suffix("grocery_pos"), "grocery");
        assert_eq!(strip_channel_suffix("misc_net"), "misc");
        assert_eq!(strip_channel_suffix("gas_transport"), "gas_transport");
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let (records, skipped) = read_records(CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(skipped, 1);
        assert_eq!(records[0].category, "grocery");
        assert_eq!(records[1].category, "shopping");
        assert_eq!(records[2].salary, None);
    }

    #[tokio::test]
    async fn store_upserts_users_and_replaces_transactions() {
        let pool = connect_in_memory().await.unwrap();
        let (records, _) = read_records(CSV.as_bytes()).unwrap();

        let (users, txs) = store_records(&pool, &records, false).await.unwrap();
        assert_eq!((users, txs), (2, 3));

        store_records(&pool, &records, true).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 3);
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 2);
    }

    #[tokio::test]
    async fn import_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credit_card_transaction.csv");
        std::fs::write(&path, CSV).unwrap();

        let pool = connect_in_memory().await.unwrap();
        let stats = import_csv(&pool, &path, false).await.unwrap();
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_skipped, 1);
        assert_eq!(stats.transactions, 3);
    }
}
