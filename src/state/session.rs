use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    questions::{
        model::{GenerationCriteria, Question},
        source::SourceTag,
    },
    state::scoring,
};

/// High-level phases a session moves through.
///
/// `InProgress` carries the current question index; once `Ended` is reached
/// the session never runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Players join and leave; the host may start the game.
    Lobby,
    /// Blocked on the question source.
    Starting,
    /// Playing question `index` (0-based).
    InProgress {
        /// Index of the question currently open for answers.
        index: usize,
    },
    /// Terminal phase; final scores are frozen.
    Ended,
}

/// Why a session reached `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// Every question was presented and closed.
    Completed,
    /// The host ended the game early.
    HostEnded,
    /// The question source could not supply a full set.
    StartFailed,
    /// The room was torn down around the session.
    RoomClosed,
}

/// A participant in the session.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier the client reconnects with.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Presence flag; a disconnected player stays in the roster with their
    /// accumulated score so they can reconnect.
    pub connected: bool,
    /// Exactly one player holds this while the roster is non-empty.
    pub is_host: bool,
    /// Running score.
    pub score: u32,
    /// Consecutive correct answers, reset on any miss or timeout.
    pub streak: u32,
    /// Highest streak reached this session.
    pub best_streak: u32,
    /// Number of correct answers this session.
    pub correct_answers: u32,
}

/// One submitted (or auto-filled) answer for a (player, question) pair.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// Submitted choice index; `None` for a deadline timeout.
    pub value: Option<u32>,
    /// Seconds the player took, clamped to the question's time limit.
    pub time_taken_secs: f64,
    /// Whether the submitted value matched the correct choice.
    pub correct: bool,
    /// Points awarded for this record.
    pub points: u32,
}

/// Where the session's questions came from, echoed to clients on start.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// Which path of the question source produced the set.
    pub source: SourceTag,
    /// Criteria the set was requested with.
    pub criteria: GenerationCriteria,
    /// Number of questions in the fixed sequence.
    pub question_count: usize,
}

/// Errors raised by session operations.
///
/// `OutsideWindow`, `DuplicateAnswer`, and `UnknownChoice` are rejected to
/// the submitting client only; `InvalidPhase` and `NotHost` are state
/// conflicts that leave the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The player is not part of this room's roster.
    #[error("unknown player `{0}`")]
    UnknownPlayer(Uuid),
    /// A host-only action was requested by a non-host.
    #[error("only the host can {action}")]
    NotHost {
        /// The action that was refused.
        action: &'static str,
    },
    /// The event cannot be applied in the current phase.
    #[error("{event} cannot be applied while in {phase:?}")]
    InvalidPhase {
        /// The event that was refused.
        event: &'static str,
        /// The phase the session was in.
        phase: SessionPhase,
    },
    /// An answer arrived for a question that is not currently open.
    #[error("question {index} is not open for answers")]
    OutsideWindow {
        /// The question index the answer targeted.
        index: usize,
    },
    /// A second answer arrived for the same (player, question) pair.
    #[error("player `{player}` already answered question {index}")]
    DuplicateAnswer {
        /// The submitting player.
        player: Uuid,
        /// The question index.
        index: usize,
    },
    /// The submitted choice index does not exist on the question.
    #[error("choice {value} does not exist on question {index}")]
    UnknownChoice {
        /// The submitted choice index.
        value: u32,
        /// The question index.
        index: usize,
    },
    /// A session can never start with an empty question sequence.
    #[error("refusing to start with zero questions")]
    NoQuestions,
}

/// Outcome of a join: whether the caller is (now) the host and whether this
/// was a reconnection of a known player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The joining player holds the host role.
    pub is_host: bool,
    /// The player id was already in the roster (reconnect).
    pub rejoined: bool,
}

/// Result of scoring one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    /// Question the answer applied to.
    pub index: usize,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded.
    pub points: u32,
    /// The correct choice index, revealed to the answering player.
    pub correct_choice: u32,
    /// The player's new running total.
    pub total_score: u32,
    /// The player's streak after this answer.
    pub streak: u32,
}

/// What happened when a question's deadline expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryReport {
    /// The question that just closed.
    pub closed_index: usize,
    /// Correct choice of the closed question, for the reveal broadcast.
    pub correct_choice: u32,
    /// Players who received an auto-incorrect record.
    pub timed_out: Vec<Uuid>,
    /// Whether the session advanced or finished.
    pub outcome: ExpiryOutcome,
}

/// Continuation after a deadline expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The next question is now open.
    Advanced {
        /// Index of the newly opened question.
        next_index: usize,
    },
    /// That was the last question; the session ended.
    Finished,
}

/// Final per-player result, ordered best-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerStanding {
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Final score.
    pub score: u32,
    /// Correct answers this session.
    pub correct_answers: u32,
    /// Highest streak reached.
    pub best_streak: u32,
}

/// Per-session score contribution handed to the external leaderboard store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardDelta {
    /// Room the session ran in.
    pub room_id: String,
    /// Session identifier.
    pub session_id: Uuid,
    /// One entry per roster player.
    pub entries: Vec<PlayerStanding>,
}

/// One complete play-through of a fixed question sequence, plus the lobby
/// leading up to it.
///
/// The session is pure state: no IO, no timers. The room actor owns the
/// clock and feeds `expire_current` when a deadline elapses, which keeps
/// every transition serialized and directly testable.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: Uuid,
    room_id: String,
    created_at: OffsetDateTime,
    phase: SessionPhase,
    roster: IndexMap<Uuid, Player>,
    questions: Vec<Question>,
    metadata: Option<SessionMetadata>,
    answers: Vec<HashMap<Uuid, AnswerRecord>>,
    deadline: Option<OffsetDateTime>,
    ended: Option<EndReason>,
}

impl GameSession {
    /// Create an empty lobby for `room_id`.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            created_at: OffsetDateTime::now_utc(),
            phase: SessionPhase::Lobby,
            roster: IndexMap::new(),
            questions: Vec::new(),
            metadata: None,
            answers: Vec::new(),
            deadline: None,
            ended: None,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Room this session belongs to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Why the session ended, once it has.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.ended
    }

    /// Join-ordered roster.
    pub fn roster(&self) -> &IndexMap<Uuid, Player> {
        &self.roster
    }

    /// Generation metadata, available from activation onwards.
    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    /// The question currently open for answers, if any.
    pub fn current_question(&self) -> Option<(usize, &Question)> {
        match self.phase {
            SessionPhase::InProgress { index } => Some((index, &self.questions[index])),
            _ => None,
        }
    }

    /// Wall-clock deadline of the open question, for broadcast payloads.
    pub fn deadline(&self) -> Option<OffsetDateTime> {
        self.deadline
    }

    /// The player currently holding the host role.
    pub fn host_id(&self) -> Option<Uuid> {
        self.roster
            .values()
            .find(|player| player.is_host)
            .map(|player| player.id)
    }

    /// Number of currently connected players.
    pub fn connected_count(&self) -> usize {
        self.roster.values().filter(|p| p.connected).count()
    }

    /// Add a player, or reconnect a known one.
    ///
    /// Allowed in every phase except `Ended`; joining mid-game makes the
    /// player a late-joiner with zero retroactive score. The first joiner
    /// becomes the host.
    pub fn join(&mut self, player_id: Uuid, name: &str) -> Result<JoinOutcome, SessionError> {
        if self.phase == SessionPhase::Ended {
            return Err(SessionError::InvalidPhase {
                event: "join-room",
                phase: self.phase,
            });
        }

        if let Some(player) = self.roster.get_mut(&player_id) {
            player.connected = true;
            if !name.trim().is_empty() {
                player.name = name.trim().to_string();
            }
            return Ok(JoinOutcome {
                is_host: player.is_host,
                rejoined: true,
            });
        }

        let is_host = self.roster.is_empty();
        self.roster.insert(
            player_id,
            Player {
                id: player_id,
                name: name.trim().to_string(),
                connected: true,
                is_host,
                score: 0,
                streak: 0,
                best_streak: 0,
                correct_answers: 0,
            },
        );

        Ok(JoinOutcome {
            is_host,
            rejoined: false,
        })
    }

    /// Flag a player as disconnected, reassigning the host role when needed.
    ///
    /// Returns the new host's id when the role moved. Deadlines keep running:
    /// disconnection is a presence concern, not a game-clock concern.
    pub fn mark_disconnected(&mut self, player_id: Uuid) -> Result<Option<Uuid>, SessionError> {
        let player = self
            .roster
            .get_mut(&player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        player.connected = false;

        if !player.is_host {
            return Ok(None);
        }

        let Some(successor) = self
            .roster
            .values()
            .find(|candidate| candidate.connected && candidate.id != player_id)
            .map(|candidate| candidate.id)
        else {
            // Nobody else is connected; the disconnected host keeps the role
            // so the roster always carries exactly one host.
            return Ok(None);
        };

        self.roster[&player_id].is_host = false;
        self.roster[&successor].is_host = true;
        Ok(Some(successor))
    }

    /// Host-only transition from `Lobby` to `Starting`.
    pub fn begin_starting(&mut self, requested_by: Uuid) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Lobby {
            return Err(SessionError::InvalidPhase {
                event: "start-game",
                phase: self.phase,
            });
        }

        let requester = self
            .roster
            .get(&requested_by)
            .ok_or(SessionError::UnknownPlayer(requested_by))?;
        if !requester.is_host {
            return Err(SessionError::NotHost {
                action: "start the game",
            });
        }

        self.phase = SessionPhase::Starting;
        Ok(())
    }

    /// Install the generated question sequence and open question 0.
    ///
    /// The sequence is immutable from here on; regenerating requires ending
    /// this session and creating a new one.
    pub fn activate(
        &mut self,
        questions: Vec<Question>,
        metadata: SessionMetadata,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Starting {
            return Err(SessionError::InvalidPhase {
                event: "activate",
                phase: self.phase,
            });
        }
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        self.answers = (0..questions.len()).map(|_| HashMap::new()).collect();
        self.questions = questions;
        self.metadata = Some(metadata);
        self.phase = SessionPhase::InProgress { index: 0 };
        self.arm_deadline(0);
        Ok(())
    }

    /// Abort a `Starting` session whose question source failed outright.
    pub fn fail_starting(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Starting {
            return Err(SessionError::InvalidPhase {
                event: "start-failure",
                phase: self.phase,
            });
        }
        self.phase = SessionPhase::Ended;
        self.ended = Some(EndReason::StartFailed);
        self.deadline = None;
        Ok(())
    }

    /// Record one player's answer to the currently open question.
    ///
    /// Rejects (without altering any existing record) answers that target a
    /// closed or future question, duplicates, and out-of-range choices.
    pub fn submit_answer(
        &mut self,
        player_id: Uuid,
        index: usize,
        value: u32,
        time_taken_secs: f64,
    ) -> Result<AnswerOutcome, SessionError> {
        let SessionPhase::InProgress { index: current } = self.phase else {
            return Err(SessionError::InvalidPhase {
                event: "submit-answer",
                phase: self.phase,
            });
        };
        if !self.roster.contains_key(&player_id) {
            return Err(SessionError::UnknownPlayer(player_id));
        }
        if index != current {
            return Err(SessionError::OutsideWindow { index });
        }
        if self.answers[current].contains_key(&player_id) {
            return Err(SessionError::DuplicateAnswer {
                player: player_id,
                index,
            });
        }

        let question = &self.questions[current];
        if (value as usize) >= question.choices.len() {
            return Err(SessionError::UnknownChoice { value, index });
        }

        let limit = f64::from(question.time_limit_secs);
        let time_taken = time_taken_secs.clamp(0.0, limit);
        let time_remaining = limit - time_taken;

        let correct = value == question.correct_choice;
        let player = &mut self.roster[&player_id];
        let points = scoring::score(correct, time_remaining, player.streak, question.difficulty);

        if correct {
            player.streak += 1;
            player.best_streak = player.best_streak.max(player.streak);
            player.correct_answers += 1;
            player.score += points;
        } else {
            player.streak = 0;
        }
        let total_score = player.score;
        let streak = player.streak;

        self.answers[current].insert(
            player_id,
            AnswerRecord {
                value: Some(value),
                time_taken_secs: time_taken,
                correct,
                points,
            },
        );

        Ok(AnswerOutcome {
            index,
            correct,
            points,
            correct_choice: question.correct_choice,
            total_score,
            streak,
        })
    }

    /// Close the open question because its deadline elapsed.
    ///
    /// Every roster player without a record receives an auto-incorrect one
    /// (zero time remaining, streak reset), then the session advances to the
    /// next question or ends after the last.
    pub fn expire_current(&mut self) -> Result<ExpiryReport, SessionError> {
        let SessionPhase::InProgress { index } = self.phase else {
            return Err(SessionError::InvalidPhase {
                event: "deadline-expiry",
                phase: self.phase,
            });
        };

        let question = &self.questions[index];
        let limit = f64::from(question.time_limit_secs);
        let correct_choice = question.correct_choice;

        let missing: Vec<Uuid> = self
            .roster
            .keys()
            .filter(|id| !self.answers[index].contains_key(id))
            .copied()
            .collect();
        for player_id in &missing {
            self.answers[index].insert(
                *player_id,
                AnswerRecord {
                    value: None,
                    time_taken_secs: limit,
                    correct: false,
                    points: 0,
                },
            );
            self.roster[player_id].streak = 0;
        }

        let outcome = if index + 1 < self.questions.len() {
            let next_index = index + 1;
            self.phase = SessionPhase::InProgress { index: next_index };
            self.arm_deadline(next_index);
            ExpiryOutcome::Advanced { next_index }
        } else {
            self.phase = SessionPhase::Ended;
            self.ended = Some(EndReason::Completed);
            self.deadline = None;
            ExpiryOutcome::Finished
        };

        Ok(ExpiryReport {
            closed_index: index,
            correct_choice,
            timed_out: missing,
            outcome,
        })
    }

    /// Host-only early end of the session.
    pub fn end_requested_by(&mut self, player_id: Uuid) -> Result<(), SessionError> {
        let requester = self
            .roster
            .get(&player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        if !requester.is_host {
            return Err(SessionError::NotHost {
                action: "end the game",
            });
        }
        self.finish(EndReason::HostEnded)
    }

    /// Terminate the session for `reason` from any non-terminal phase.
    pub fn finish(&mut self, reason: EndReason) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Ended {
            return Err(SessionError::InvalidPhase {
                event: "end-game",
                phase: self.phase,
            });
        }
        self.phase = SessionPhase::Ended;
        self.ended = Some(reason);
        self.deadline = None;
        Ok(())
    }

    /// Final results ordered by score (join order breaks ties).
    pub fn standings(&self) -> Vec<PlayerStanding> {
        let mut standings: Vec<PlayerStanding> = self
            .roster
            .values()
            .map(|player| PlayerStanding {
                player_id: player.id,
                name: player.name.clone(),
                score: player.score,
                correct_answers: player.correct_answers,
                best_streak: player.best_streak,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    /// Score contribution for the external leaderboard store.
    ///
    /// `None` when nothing was played (no answer records), so aborted
    /// lobbies produce nothing to merge.
    pub fn leaderboard_delta(&self) -> Option<LeaderboardDelta> {
        if self.answers.iter().all(|records| records.is_empty()) {
            return None;
        }
        Some(LeaderboardDelta {
            room_id: self.room_id.clone(),
            session_id: self.id,
            entries: self.standings(),
        })
    }

    /// Build the follow-up lobby once this session is disposed.
    ///
    /// Connected players carry over with scores cleared; the host role stays
    /// with the current host when still connected, else the first carried
    /// player takes it.
    pub fn successor(&self) -> GameSession {
        let mut next = GameSession::new(self.room_id.clone());
        let carried: Vec<&Player> = self.roster.values().filter(|p| p.connected).collect();
        let host_carried = carried.iter().any(|p| p.is_host);

        for (position, player) in carried.iter().enumerate() {
            next.roster.insert(
                player.id,
                Player {
                    id: player.id,
                    name: player.name.clone(),
                    connected: true,
                    is_host: if host_carried {
                        player.is_host
                    } else {
                        position == 0
                    },
                    score: 0,
                    streak: 0,
                    best_streak: 0,
                    correct_answers: 0,
                },
            );
        }
        next
    }

    /// Answer record for a (player, question) pair, if one exists.
    pub fn answer_record(&self, player_id: Uuid, index: usize) -> Option<&AnswerRecord> {
        self.answers.get(index)?.get(&player_id)
    }

    /// Total questions in the fixed sequence (0 before activation).
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Question at `index`, answered or not.
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    fn arm_deadline(&mut self, index: usize) {
        let limit = i64::from(self.questions[index].time_limit_secs);
        self.deadline = Some(OffsetDateTime::now_utc() + Duration::seconds(limit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::model::{AgeGroup, Difficulty};

    fn question(difficulty: Difficulty, time_limit_secs: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            category: "general".into(),
            prompt: "?".into(),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_choice: 1,
            difficulty,
            time_limit_secs,
            point_value: difficulty.base_points(),
            fun_fact: None,
        }
    }

    fn metadata(count: usize) -> SessionMetadata {
        SessionMetadata {
            source: SourceTag::FallbackDatabase,
            criteria: GenerationCriteria {
                topics: vec!["general".into()],
                difficulty: Difficulty::Easy,
                age_group: AgeGroup::AllAges,
                theme: None,
            },
            question_count: count,
        }
    }

    fn started_session(players: &[Uuid], questions: Vec<Question>) -> GameSession {
        let mut session = GameSession::new("living-room");
        for (i, id) in players.iter().enumerate() {
            session.join(*id, &format!("player-{i}")).unwrap();
        }
        session.begin_starting(players[0]).unwrap();
        let count = questions.len();
        session.activate(questions, metadata(count)).unwrap();
        session
    }

    #[test]
    fn first_joiner_is_host_and_reconnect_keeps_score() {
        let mut session = GameSession::new("den");
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let joined = session.join(alice, "Alice").unwrap();
        assert!(joined.is_host && !joined.rejoined);
        let joined = session.join(bob, "Bob").unwrap();
        assert!(!joined.is_host);

        session.mark_disconnected(bob).unwrap();
        let rejoined = session.join(bob, "Bob").unwrap();
        assert!(rejoined.rejoined);
        assert_eq!(session.connected_count(), 2);
    }

    #[test]
    fn start_requires_host_and_lobby_phase() {
        let mut session = GameSession::new("den");
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        session.join(alice, "Alice").unwrap();
        session.join(bob, "Bob").unwrap();

        let err = session.begin_starting(bob).unwrap_err();
        assert!(matches!(err, SessionError::NotHost { .. }));

        session.begin_starting(alice).unwrap();
        let err = session.begin_starting(alice).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidPhase {
                event: "start-game",
                phase: SessionPhase::Starting,
            }
        ));
    }

    #[test]
    fn activation_refuses_empty_question_set() {
        let mut session = GameSession::new("den");
        let alice = Uuid::new_v4();
        session.join(alice, "Alice").unwrap();
        session.begin_starting(alice).unwrap();
        assert_eq!(
            session.activate(Vec::new(), metadata(0)),
            Err(SessionError::NoQuestions)
        );
    }

    #[test]
    fn correct_answer_scores_and_increments_streak() {
        let alice = Uuid::new_v4();
        let mut session = started_session(&[alice], vec![question(Difficulty::Easy, 20)]);

        let outcome = session.submit_answer(alice, 0, 1, 5.0).unwrap();
        assert!(outcome.correct);
        // base 50 + 15s * 2 = 80, streak multiplier 1.0
        assert_eq!(outcome.points, 80);
        assert_eq!(outcome.total_score, 80);
        assert_eq!(outcome.streak, 1);
    }

    #[test]
    fn duplicate_submission_is_rejected_and_leaves_first_record() {
        let alice = Uuid::new_v4();
        let mut session = started_session(
            &[alice],
            vec![question(Difficulty::Easy, 20), question(Difficulty::Easy, 20)],
        );

        let first = session.submit_answer(alice, 0, 1, 5.0).unwrap();
        let err = session.submit_answer(alice, 0, 2, 1.0).unwrap_err();
        assert_eq!(
            err,
            SessionError::DuplicateAnswer {
                player: alice,
                index: 0,
            }
        );

        let record = session.answer_record(alice, 0).unwrap();
        assert_eq!(record.value, Some(1));
        assert_eq!(record.points, first.points);
        assert_eq!(session.roster()[&alice].score, first.points);
    }

    #[test]
    fn answer_for_closed_or_future_question_is_rejected() {
        let alice = Uuid::new_v4();
        let mut session = started_session(
            &[alice],
            vec![question(Difficulty::Easy, 20), question(Difficulty::Easy, 20)],
        );

        assert_eq!(
            session.submit_answer(alice, 1, 0, 1.0).unwrap_err(),
            SessionError::OutsideWindow { index: 1 }
        );

        session.expire_current().unwrap();
        assert_eq!(
            session.submit_answer(alice, 0, 1, 1.0).unwrap_err(),
            SessionError::OutsideWindow { index: 0 }
        );
    }

    #[test]
    fn expiry_auto_scores_missing_players_and_advances_once() {
        let players: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut session = started_session(
            &players,
            vec![question(Difficulty::Easy, 20), question(Difficulty::Easy, 20)],
        );

        session.submit_answer(players[0], 0, 1, 3.0).unwrap();
        session.submit_answer(players[1], 0, 0, 3.0).unwrap();

        let report = session.expire_current().unwrap();
        assert_eq!(report.closed_index, 0);
        assert_eq!(report.timed_out, vec![players[2]]);
        assert_eq!(report.outcome, ExpiryOutcome::Advanced { next_index: 1 });

        let record = session.answer_record(players[2], 0).unwrap();
        assert!(record.value.is_none() && !record.correct);
        assert_eq!(record.points, 0);
        assert_eq!(session.roster()[&players[2]].streak, 0);
        assert_eq!(session.phase(), SessionPhase::InProgress { index: 1 });
    }

    #[test]
    fn session_presents_exactly_n_questions_with_full_ledger() {
        let players: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let n = 3;
        let questions = (0..n).map(|_| question(Difficulty::Medium, 15)).collect();
        let mut session = started_session(&players, questions);

        let mut presented = 1;
        loop {
            session.submit_answer(players[0], presented - 1, 1, 2.0).unwrap();
            match session.expire_current().unwrap().outcome {
                ExpiryOutcome::Advanced { .. } => presented += 1,
                ExpiryOutcome::Finished => break,
            }
        }

        assert_eq!(presented, n);
        assert_eq!(session.phase(), SessionPhase::Ended);
        assert_eq!(session.end_reason(), Some(EndReason::Completed));
        for index in 0..n {
            for player in &players {
                assert!(session.answer_record(*player, index).is_some());
            }
        }

        // total score equals the sum of record points
        for player in &players {
            let total: u32 = (0..n)
                .map(|i| session.answer_record(*player, i).unwrap().points)
                .sum();
            assert_eq!(session.roster()[player].score, total);
        }
    }

    #[test]
    fn host_disconnect_transfers_role_without_ending_session() {
        let players: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut session = started_session(&players, vec![question(Difficulty::Easy, 20)]);
        session.submit_answer(players[1], 0, 1, 2.0).unwrap();
        let score_before = session.roster()[&players[1]].score;

        let new_host = session.mark_disconnected(players[0]).unwrap();
        assert_eq!(new_host, Some(players[1]));
        assert_eq!(session.host_id(), Some(players[1]));
        assert!(matches!(session.phase(), SessionPhase::InProgress { .. }));
        assert_eq!(session.roster()[&players[1]].score, score_before);
    }

    #[test]
    fn host_role_stays_put_when_everyone_is_disconnected() {
        let mut session = GameSession::new("den");
        let alice = Uuid::new_v4();
        session.join(alice, "Alice").unwrap();
        assert_eq!(session.mark_disconnected(alice).unwrap(), None);
        assert_eq!(session.host_id(), Some(alice));
    }

    #[test]
    fn streak_resets_on_miss_and_multiplies_when_built() {
        let alice = Uuid::new_v4();
        let questions = (0..3).map(|_| question(Difficulty::Easy, 20)).collect();
        let mut session = started_session(&[alice], questions);

        session.submit_answer(alice, 0, 1, 20.0).unwrap();
        session.expire_current().unwrap();
        // streak 1 now: (50 + 0) * 1.1 = 55
        let second = session.submit_answer(alice, 1, 1, 20.0).unwrap();
        assert_eq!(second.points, 55);
        session.expire_current().unwrap();

        let third = session.submit_answer(alice, 2, 0, 1.0).unwrap();
        assert!(!third.correct);
        assert_eq!(third.points, 0);
        assert_eq!(third.streak, 0);
    }

    #[test]
    fn late_joiner_enters_with_zero_score_mid_game() {
        let alice = Uuid::new_v4();
        let late = Uuid::new_v4();
        let mut session = started_session(
            &[alice],
            vec![question(Difficulty::Easy, 20), question(Difficulty::Easy, 20)],
        );
        session.submit_answer(alice, 0, 1, 2.0).unwrap();
        session.expire_current().unwrap();

        let joined = session.join(late, "Late").unwrap();
        assert!(!joined.is_host);
        assert_eq!(session.roster()[&late].score, 0);
        assert!(session.answer_record(late, 0).is_none());

        session.expire_current().unwrap();
        assert!(session.answer_record(late, 1).is_some());
    }

    #[test]
    fn ended_session_rejects_everything_and_stays_ended() {
        let alice = Uuid::new_v4();
        let mut session = started_session(&[alice], vec![question(Difficulty::Easy, 20)]);
        session.expire_current().unwrap();
        assert_eq!(session.phase(), SessionPhase::Ended);

        assert!(session.join(Uuid::new_v4(), "Nope").is_err());
        assert!(session.submit_answer(alice, 0, 1, 1.0).is_err());
        assert!(session.expire_current().is_err());
        assert!(session.finish(EndReason::RoomClosed).is_err());
    }

    #[test]
    fn failed_start_ends_without_questions() {
        let alice = Uuid::new_v4();
        let mut session = GameSession::new("den");
        session.join(alice, "Alice").unwrap();
        session.begin_starting(alice).unwrap();
        session.fail_starting().unwrap();
        assert_eq!(session.phase(), SessionPhase::Ended);
        assert_eq!(session.end_reason(), Some(EndReason::StartFailed));
        assert!(session.leaderboard_delta().is_none());
    }

    #[test]
    fn leaderboard_delta_emitted_only_when_something_was_played() {
        let alice = Uuid::new_v4();
        let mut session = started_session(&[alice], vec![question(Difficulty::Easy, 20)]);
        session.submit_answer(alice, 0, 1, 2.0).unwrap();
        session.expire_current().unwrap();

        let delta = session.leaderboard_delta().expect("delta after play");
        assert_eq!(delta.entries.len(), 1);
        assert_eq!(delta.entries[0].player_id, alice);
        assert!(delta.entries[0].score > 0);
    }

    #[test]
    fn successor_carries_connected_players_with_reset_scores() {
        let players: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut session = started_session(&players, vec![question(Difficulty::Easy, 20)]);
        session.submit_answer(players[0], 0, 1, 2.0).unwrap();
        session.expire_current().unwrap();
        session.mark_disconnected(players[2]).unwrap();

        let next = session.successor();
        assert_eq!(next.phase(), SessionPhase::Lobby);
        assert_eq!(next.roster().len(), 2);
        assert_eq!(next.host_id(), Some(players[0]));
        assert!(next.roster().values().all(|p| p.score == 0 && p.streak == 0));
    }

    #[test]
    fn standings_order_best_first() {
        let players: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let mut session = started_session(&players, vec![question(Difficulty::Easy, 20)]);
        session.submit_answer(players[1], 0, 1, 2.0).unwrap();
        session.expire_current().unwrap();

        let standings = session.standings();
        assert_eq!(standings[0].player_id, players[1]);
        assert!(standings[0].score > standings[1].score);
    }
}
