//! Frames accepted from player WebSocket clients.

use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::validation::validate_room_code;
use crate::questions::model::{AgeGroup, Difficulty, GenerationCriteria};

/// Why an inbound frame was rejected before reaching the room.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload is not valid JSON for any known frame.
    #[error("malformed frame: {0}")]
    Parse(#[from] serde_json::Error),
    /// The frame parsed but one of its fields is out of bounds.
    #[error("invalid frame: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Messages accepted from player WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Enter a room, creating it if it does not exist yet.
    JoinRoom(JoinRoomFrame),
    /// Host request to begin a game with the given criteria.
    StartGame(StartGameFrame),
    /// Answer submission for the question currently open.
    SubmitAnswer(SubmitAnswerFrame),
    /// Host request to finish the game early.
    EndGame(EndGameFrame),
}

impl ClientFrame {
    /// Parse and validate a frame from raw WebSocket text.
    pub fn from_json_str(raw: &str) -> Result<Self, FrameError> {
        let frame: Self = serde_json::from_str(raw)?;
        frame.validate()?;
        Ok(frame)
    }

    /// Room the frame addresses.
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom(frame) => &frame.room_id,
            Self::StartGame(frame) => &frame.room_id,
            Self::SubmitAnswer(frame) => &frame.room_id,
            Self::EndGame(frame) => &frame.room_id,
        }
    }
}

impl Validate for ClientFrame {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::JoinRoom(frame) => frame.validate(),
            Self::StartGame(frame) => frame.validate(),
            Self::SubmitAnswer(frame) => frame.validate(),
            Self::EndGame(frame) => frame.validate(),
        }
    }
}

/// Payload of a `join-room` frame.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRoomFrame {
    /// Room code chosen by the players.
    #[validate(custom(function = validate_room_code))]
    pub room_id: String,
    /// Identity to resume; omitted on a first join.
    pub player_id: Option<Uuid>,
    /// Display name shown to the rest of the room.
    #[validate(length(min = 1, max = 32, message = "Player name must be 1 to 32 characters"))]
    pub player_name: String,
}

/// Payload of a `start-game` frame.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartGameFrame {
    /// Room code the host is starting.
    #[validate(custom(function = validate_room_code))]
    pub room_id: String,
    /// Requested topics; empty means any topic.
    #[serde(default)]
    #[validate(length(max = 8, message = "At most 8 topics may be requested"))]
    pub topics: Vec<String>,
    /// Requested difficulty tier.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Audience the questions must suit.
    #[serde(default)]
    pub age_group: AgeGroup,
    /// Free-form flavour hint passed to the generator.
    pub theme: Option<String>,
}

impl StartGameFrame {
    /// Criteria the question pipeline should satisfy.
    pub fn criteria(&self) -> GenerationCriteria {
        GenerationCriteria {
            topics: self.topics.clone(),
            difficulty: self.difficulty,
            age_group: self.age_group,
            theme: self.theme.clone(),
        }
    }
}

/// Payload of a `submit-answer` frame.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswerFrame {
    /// Room code the answer belongs to.
    #[validate(custom(function = validate_room_code))]
    pub room_id: String,
    /// Zero-based index of the question being answered.
    pub question_index: u32,
    /// Index of the chosen answer option.
    pub value: u32,
    /// Seconds elapsed between delivery and submission, client-measured.
    #[validate(range(min = 0.0, message = "Time taken cannot be negative"))]
    pub time_taken_seconds: f64,
}

/// Payload of an `end-game` frame.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EndGameFrame {
    /// Room code the host is ending.
    #[validate(custom(function = validate_room_code))]
    pub room_id: String,
    /// Free-form reason the client supplied, if any.
    pub reason: Option<String>,
}
