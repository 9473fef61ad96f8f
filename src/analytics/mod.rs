pub mod leaderboard;
pub mod locator;
pub mod shares;

pub use leaderboard::{rank_population, window, PeerMetric, RankedPopulation};
pub use locator::{inv_norm, normal_cdf, top_percent_to_z, PercentilePlacement};
pub use shares::{aggregate, CategoryShares};
