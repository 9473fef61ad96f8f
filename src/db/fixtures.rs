//! Test records shared by the repository and report tests.

use crate::db::import::strip_channel_suffix;
use crate::db::models::TransactionRecord;

pub fn record(
    user_id: &str,
    state: &str,
    age: i64,
    unix_time: i64,
    category: &str,
    amount: f64,
) -> TransactionRecord {
    TransactionRecord {
        user_id: user_id.to_string(),
        name: format!("{user_id} name"),
        gender: Some(if age % 2 == 0 { "F" } else { "M" }.to_string()),
        city: Some("Springfield".to_string()),
        state: Some(state.to_string()),
        age: Some(age),
        salary: Some(73_000.0),
        unix_time,
        category: strip_channel_suffix(category),
        amount,
    }
}
