//! Frames pushed to clients over WebSocket and SSE.
//!
//! Both transports carry the same tagged JSON payloads; SSE additionally
//! names the event after the frame's `type` tag.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::questions::model::{AgeGroup, Difficulty, Question};
use crate::questions::source::SourceTag;
use crate::state::session::{
    EndReason, GameSession, LeaderboardDelta, Player, PlayerStanding, SessionMetadata,
};

/// Roster entry as shown to every client in the room.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Stable player identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Whether this player currently controls the game.
    pub is_host: bool,
    /// Presence flag.
    pub connected: bool,
    /// Running score.
    pub score: u32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            is_host: player.is_host,
            connected: player.connected,
            score: player.score,
        }
    }
}

/// A question as delivered to players.
///
/// The correct choice and the fun fact are withheld until the answer window
/// closes.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    /// Question identifier.
    pub id: Uuid,
    /// Topic bucket the question belongs to.
    pub category: String,
    /// The question text.
    pub prompt: String,
    /// Answer options, in presentation order.
    pub choices: Vec<String>,
    /// Difficulty tier.
    pub difficulty: Difficulty,
    /// Answer window length in seconds.
    pub time_limit_secs: u32,
    /// Base points before time and streak bonuses.
    pub point_value: u32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            category: question.category.clone(),
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
            difficulty: question.difficulty,
            time_limit_secs: question.time_limit_secs,
            point_value: question.point_value,
        }
    }
}

/// Where the running game's questions came from and what was asked for.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Session identifier, distinct from the room code.
    pub session_id: Uuid,
    /// Origin of the question set.
    pub source: SourceTag,
    /// Topics requested by the host; empty means any.
    pub topics: Vec<String>,
    /// Requested difficulty tier.
    pub difficulty: Difficulty,
    /// Audience the questions suit.
    pub age_group: AgeGroup,
    /// Flavour hint the host supplied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Total number of questions in this game.
    pub question_count: usize,
}

impl SessionSummary {
    /// Summarise an activated session for the `game-started` frame.
    pub fn new(session: &GameSession, metadata: &SessionMetadata) -> Self {
        Self {
            session_id: session.id(),
            source: metadata.source,
            topics: metadata.criteria.topics.clone(),
            difficulty: metadata.criteria.difficulty,
            age_group: metadata.criteria.age_group,
            theme: metadata.criteria.theme.clone(),
            question_count: metadata.question_count,
        }
    }
}

/// Messages pushed to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Acknowledges a join and describes the room to the newcomer.
    RoomJoined {
        /// Room the player entered.
        room_id: String,
        /// Identity to present on reconnect.
        player_id: Uuid,
        /// Whether the newcomer holds the host role.
        is_host: bool,
        /// Everyone currently in the roster.
        roster: Vec<PlayerSummary>,
    },
    /// The roster changed: someone joined, left or reconnected.
    RosterUpdated {
        /// The full roster after the change.
        roster: Vec<PlayerSummary>,
    },
    /// Host role moved to another player.
    HostChanged {
        /// The new host.
        player_id: Uuid,
    },
    /// The game began; the first question is open.
    GameStarted {
        /// What is being played and where the questions came from.
        session: SessionSummary,
        /// Index of the question now open.
        question_index: u32,
        /// The question itself, answer withheld.
        question: QuestionView,
        /// RFC 3339 instant at which the answer window closes.
        deadline: String,
    },
    /// The next question is open for answers.
    QuestionDelivered {
        /// Index of the question now open.
        question_index: u32,
        /// The question itself, answer withheld.
        question: QuestionView,
        /// RFC 3339 instant at which the answer window closes.
        deadline: String,
    },
    /// Private feedback to the submitting player.
    AnswerResult {
        /// Question the verdict is for.
        question_index: u32,
        /// Whether the submitted choice was right.
        correct: bool,
        /// Points awarded for this answer.
        points_earned: u32,
        /// Index of the correct choice.
        correct_answer: u32,
        /// Player's score after this answer.
        new_total_score: u32,
        /// Player's streak after this answer.
        streak: u32,
    },
    /// The answer window closed; the correct choice is revealed to everyone.
    QuestionClosed {
        /// Question that just closed.
        question_index: u32,
        /// Index of the correct choice.
        correct_answer: u32,
        /// Trivia shown between questions, when the set carries one.
        #[serde(skip_serializing_if = "Option::is_none")]
        fun_fact: Option<String>,
    },
    /// The game is over; scores are frozen.
    GameEnded {
        /// Why the game ended.
        reason: EndReason,
        /// Final standings, best score first.
        final_scores: Vec<PlayerStanding>,
        /// Scores merged into the room leaderboard, when any were recorded.
        #[serde(skip_serializing_if = "Option::is_none")]
        leaderboard_delta: Option<LeaderboardDelta>,
    },
    /// The game could not start; the room is back in the lobby.
    StartGameError {
        /// Human-readable explanation.
        reason: String,
    },
    /// A request was rejected; the room state did not change.
    Error {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable explanation.
        message: String,
    },
}

impl ServerFrame {
    /// The frame's `type` tag, also used as the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room-joined",
            Self::RosterUpdated { .. } => "roster-updated",
            Self::HostChanged { .. } => "host-changed",
            Self::GameStarted { .. } => "game-started",
            Self::QuestionDelivered { .. } => "question-delivered",
            Self::AnswerResult { .. } => "answer-result",
            Self::QuestionClosed { .. } => "question-closed",
            Self::GameEnded { .. } => "game-ended",
            Self::StartGameError { .. } => "start-game-error",
            Self::Error { .. } => "error",
        }
    }
}

/// A frame as it travels through a room's broadcast channel.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// SSE event name, mirroring the frame's `type` tag.
    pub event: &'static str,
    /// The frame serialised once, fanned out to every subscriber.
    pub data: String,
}

impl RoomEvent {
    /// Serialise `frame` for broadcast.
    pub fn from_frame(frame: &ServerFrame) -> serde_json::Result<Self> {
        Ok(Self {
            event: frame.name(),
            data: serde_json::to_string(frame)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_kebab_case_type_tags() {
        let frame = ServerFrame::HostChanged {
            player_id: Uuid::new_v4(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(json["type"], "host-changed");
    }

    #[test]
    fn question_view_withholds_the_answer() {
        let question = Question {
            id: Uuid::new_v4(),
            category: "science".into(),
            prompt: "How many planets orbit the sun?".into(),
            choices: vec!["7".into(), "8".into(), "9".into()],
            correct_choice: 1,
            difficulty: Difficulty::Easy,
            time_limit_secs: 20,
            point_value: 50,
            fun_fact: Some("Pluto was reclassified in 2006.".into()),
        };
        let json = serde_json::to_value(QuestionView::from(&question)).unwrap();
        assert!(json.get("correct_choice").is_none());
        assert!(json.get("fun_fact").is_none());
        assert_eq!(json["choices"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn room_event_uses_the_frame_name() {
        let frame = ServerFrame::StartGameError {
            reason: "not enough questions".into(),
        };
        let event = RoomEvent::from_frame(&frame).unwrap();
        assert_eq!(event.event, "start-game-error");
        assert!(event.data.contains("start-game-error"));
    }
}
