//! Read-only room snapshot returned over HTTP.

use serde::Serialize;
use utoipa::ToSchema;

use super::events::PlayerSummary;
use super::format_timestamp;
use crate::questions::source::SourceTag;
use crate::state::session::{GameSession, SessionPhase};

/// Point-in-time view of a room for spectators and reconnecting clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room code.
    pub room_id: String,
    /// Current phase (`lobby`, `starting`, `in-progress` or `ended`).
    pub phase: String,
    /// Index of the open question while a game runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_index: Option<u32>,
    /// Total questions in the running game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<usize>,
    /// Where the running game's questions came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceTag>,
    /// RFC 3339 instant the open answer window closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Everyone currently in the roster.
    pub roster: Vec<PlayerSummary>,
}

impl RoomSnapshot {
    /// Capture the observable state of `session`.
    pub fn of(session: &GameSession) -> Self {
        let (phase, question_index) = match session.phase() {
            SessionPhase::Lobby => ("lobby", None),
            SessionPhase::Starting => ("starting", None),
            SessionPhase::InProgress { index } => ("in-progress", Some(index as u32)),
            SessionPhase::Ended => ("ended", None),
        };
        let metadata = session.metadata();
        Self {
            room_id: session.room_id().to_string(),
            phase: phase.to_string(),
            question_index,
            question_count: metadata.map(|m| m.question_count),
            source: metadata.map(|m| m.source),
            deadline: session.deadline().map(format_timestamp),
            roster: session.roster().values().map(PlayerSummary::from).collect(),
        }
    }
}
