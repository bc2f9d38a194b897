//! Persistent cross-game leaderboard seam.

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::info;

use crate::state::session::LeaderboardDelta;

/// Errors surfaced by a leaderboard backend.
#[derive(Debug, Error)]
pub enum LeaderboardError {
    /// The backend rejected or failed to persist the merge.
    #[error("leaderboard merge failed: {0}")]
    Merge(String),
}

/// Abstraction over wherever per-room totals accumulate across games.
pub trait LeaderboardStore: Send + Sync {
    /// Fold one finished game's scores into the room's running totals.
    fn merge(&self, delta: LeaderboardDelta) -> BoxFuture<'static, Result<(), LeaderboardError>>;
}

/// Default store that records merges in the log and keeps nothing.
///
/// Deployments wanting durable leaderboards swap in their own
/// [`LeaderboardStore`].
pub struct LoggingLeaderboard;

impl LeaderboardStore for LoggingLeaderboard {
    fn merge(&self, delta: LeaderboardDelta) -> BoxFuture<'static, Result<(), LeaderboardError>> {
        Box::pin(async move {
            for entry in &delta.entries {
                info!(
                    room_id = %delta.room_id,
                    session_id = %delta.session_id,
                    player = %entry.name,
                    score = entry.score,
                    correct_answers = entry.correct_answers,
                    best_streak = entry.best_streak,
                    "leaderboard merge"
                );
            }
            Ok(())
        })
    }
}
