//! Peer ranking and leaderboard windowing.
//!
//! Peers are ranked by spent ratio, smallest first. The displayed window is
//! the head of the board plus the subject's own row; ranks in between are
//! collapsed into a single gap marker once there are enough of them.

use crate::config::{LEADERBOARD_GAP_AFTER, LEADERBOARD_HEAD};
use crate::types::{LeaderboardRow, RankedEntry};

/// A peer's metric before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMetric {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedPopulation {
    /// Rank order; `entries[i].rank == i + 1`.
    pub entries: Vec<RankedEntry>,
    pub subject_rank: Option<u32>,
}

impl RankedPopulation {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subject(&self) -> Option<&RankedEntry> {
        let rank = self.subject_rank?;
        self.entries.get(rank as usize - 1)
    }

    /// "Top X%" for the subject, or None when the subject is not ranked.
    pub fn subject_top_percent(&self) -> Option<f64> {
        self.subject_rank.map(|rank| top_percent(rank, self.len()))
    }

    pub fn window(&self) -> Vec<LeaderboardRow> {
        window(&self.entries, self.subject_rank)
    }
}

/// Rank peers by ascending metric. Non-finite metrics are left out.
///
/// Ranks are dense (1..=n) and ties keep input order. The first peer named
/// `subject` is flagged; any later duplicate is not.
pub fn rank_population(peers: Vec<PeerMetric>, subject: &str) -> RankedPopulation {
    let mut peers: Vec<PeerMetric> = peers.into_iter().filter(|p| p.value.is_finite()).collect();
    peers.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut subject_rank = None;
    let entries = peers
        .into_iter()
        .enumerate()
        .map(|(i, peer)| {
            let rank = i as u32 + 1;
            let is_subject = subject_rank.is_none() && peer.name == subject;
            if is_subject {
                subject_rank = Some(rank);
            }
            RankedEntry {
                name: peer.name,
                rank,
                metric_value: peer.value,
                is_subject,
            }
        })
        .collect();

    RankedPopulation { entries, subject_rank }
}

/// Head of the board, then the subject (if outside the head), with a gap
/// marker when the subject sits past `LEADERBOARD_GAP_AFTER`.
pub fn window(entries: &[RankedEntry], subject_rank: Option<u32>) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = entries
        .iter()
        .take(LEADERBOARD_HEAD as usize)
        .cloned()
        .map(LeaderboardRow::Entry)
        .collect();

    let Some(rank) = subject_rank else {
        return rows;
    };
    if rank <= LEADERBOARD_HEAD {
        return rows;
    }
    let Some(subject) = entries.iter().find(|e| e.rank == rank) else {
        return rows;
    };

    if rank > LEADERBOARD_GAP_AFTER {
        rows.push(LeaderboardRow::Gap);
    }
    rows.push(LeaderboardRow::Entry(subject.clone()));
    rows
}

/// `rank / population` as a percentage; 0 for an empty population.
pub fn top_percent(rank: u32, population: usize) -> f64 {
    if population == 0 {
        return 0.0;
    }
    rank as f64 * 100.0 / population as f64
}
