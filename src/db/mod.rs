pub mod import;
pub mod models;
pub mod source;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use models::{PeerSpend, UserProfile};
pub use source::{GroupFilter, SpendingSource, TimeRange};
pub use sqlite::SqliteSource;
