//! Per-room actor: one task owns a [`GameSession`] and serialises every
//! mutation against it.
//!
//! Transports never touch the session directly. WebSocket and HTTP handlers
//! queue [`RoomCommand`]s on the actor's channel; the actor also owns the
//! room's clock (question deadlines, disposal grace) and the in-flight
//! question sourcing task, so a `tokio::select!` loop is the whole
//! concurrency story of a room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::leaderboard::LeaderboardStore;
use crate::dto::events::{PlayerSummary, QuestionView, RoomEvent, ServerFrame, SessionSummary};
use crate::dto::format_timestamp;
use crate::dto::rooms::RoomSnapshot;
use crate::error::ServiceError;
use crate::questions::cache::CachedSet;
use crate::questions::model::GenerationCriteria;
use crate::questions::source::{QuestionSource, SourceError, SourceTag};
use crate::state::hub::RoomHub;
use crate::state::session::{
    EndReason, ExpiryOutcome, GameSession, SessionMetadata, SessionPhase,
};

/// Broadcast slots per room before slow SSE subscribers start lagging.
const EVENT_CAPACITY: usize = 64;

/// Timing and sizing knobs shared by every room.
#[derive(Clone)]
pub struct RoomSettings {
    /// Questions per game.
    pub question_count: usize,
    /// How long an empty room survives before disposal.
    pub rejoin_grace: Duration,
    /// How long final scores stay visible before the room resets.
    pub results_grace: Duration,
}

/// Collaborators injected into every room actor.
#[derive(Clone)]
pub struct RoomDeps {
    /// Question pipeline shared across rooms.
    pub source: Arc<QuestionSource>,
    /// Cross-game score sink.
    pub leaderboard: Arc<dyn LeaderboardStore>,
    /// Shared timing and sizing knobs.
    pub settings: RoomSettings,
}

/// Everything a room actor can be asked to do.
pub enum RoomCommand {
    /// A client joined (or rejoined) over WebSocket.
    Join {
        /// Identity the client presented, or a fresh one.
        player_id: Uuid,
        /// Display name.
        player_name: String,
        /// Sink for frames addressed to this client alone.
        conn: mpsc::UnboundedSender<Message>,
        /// Resolved once the roster reflects the join.
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    /// A client's socket closed.
    Disconnected {
        /// The player whose connection went away.
        player_id: Uuid,
    },
    /// Host asked to start a game.
    StartGame {
        /// The requesting player.
        player_id: Uuid,
        /// What the questions should look like.
        criteria: GenerationCriteria,
    },
    /// A player answered the open question.
    SubmitAnswer {
        /// The submitting player.
        player_id: Uuid,
        /// Question the answer targets.
        question_index: u32,
        /// Chosen option index.
        value: u32,
        /// Client-measured seconds since delivery.
        time_taken_secs: f64,
    },
    /// Host asked to end the game early.
    EndGame {
        /// The requesting player.
        player_id: Uuid,
    },
    /// A spectator wants the room's event stream.
    Subscribe {
        /// Resolved with a fresh broadcast receiver.
        reply: oneshot::Sender<broadcast::Receiver<RoomEvent>>,
    },
    /// A read-only snapshot of the room.
    Snapshot {
        /// Resolved with the current state.
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

type SourcingResult = Result<(CachedSet, SourceTag), SourceError>;

/// Fetch a read-only snapshot of a live room.
pub async fn snapshot(
    state: &crate::state::SharedState,
    room_id: &str,
) -> Result<RoomSnapshot, ServiceError> {
    let missing = || ServiceError::NotFound(format!("room `{room_id}` not found"));
    let room = state.rooms().get(room_id).ok_or_else(missing)?;
    let (reply, receiver) = oneshot::channel();
    room.send(RoomCommand::Snapshot { reply })
        .map_err(|_| missing())?;
    receiver.await.map_err(|_| missing())
}

/// Drive one room until it is disposed.
///
/// Exits when the command channel closes, when the empty-room grace elapses,
/// or when the host closes the room from the lobby.
pub async fn run_room(
    room_id: String,
    mut rx: mpsc::UnboundedReceiver<RoomCommand>,
    deps: RoomDeps,
) {
    let rejoin_grace = deps.settings.rejoin_grace;
    let mut actor = RoomActor {
        session: GameSession::new(room_id.clone()),
        room_id,
        deps,
        connections: HashMap::new(),
        hub: RoomHub::new(EVENT_CAPACITY),
        generation: None,
        pending_criteria: None,
        deadline: None,
        dispose_at: Some(Instant::now() + rejoin_grace),
    };

    loop {
        let deadline = actor.deadline;
        let dispose_at = actor.dispose_at;
        tokio::select! {
            // A submission racing the deadline loses: the expiry closes the
            // answer window before any queued command is drained.
            biased;

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                actor.deadline = None;
                actor.handle_deadline();
            }
            result = poll_sourcing(&mut actor.generation) => {
                actor.generation = None;
                actor.handle_sourced(result);
            }
            () = sleep_until(dispose_at.unwrap_or_else(Instant::now)), if dispose_at.is_some() => {
                actor.dispose_at = None;
                if actor.handle_grace_elapsed() {
                    break;
                }
            }
            command = rx.recv() => {
                match command {
                    Some(command) => {
                        if actor.handle_command(command) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    if let Some(generation) = actor.generation.take() {
        generation.abort();
    }
}

/// Await the in-flight sourcing task, or park forever when there is none.
async fn poll_sourcing(
    generation: &mut Option<JoinHandle<SourcingResult>>,
) -> Result<SourcingResult, JoinError> {
    match generation {
        Some(handle) => handle.await,
        None => futures::future::pending().await,
    }
}

struct RoomActor {
    room_id: String,
    deps: RoomDeps,
    session: GameSession,
    connections: HashMap<Uuid, mpsc::UnboundedSender<Message>>,
    hub: RoomHub,
    generation: Option<JoinHandle<SourcingResult>>,
    pending_criteria: Option<GenerationCriteria>,
    deadline: Option<Instant>,
    dispose_at: Option<Instant>,
}

impl RoomActor {
    /// Returns `true` when the room should be disposed immediately.
    fn handle_command(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join {
                player_id,
                player_name,
                conn,
                reply,
            } => {
                self.handle_join(player_id, &player_name, conn, reply);
                false
            }
            RoomCommand::Disconnected { player_id } => {
                self.handle_disconnected(player_id);
                false
            }
            RoomCommand::StartGame {
                player_id,
                criteria,
            } => {
                self.handle_start(player_id, criteria);
                false
            }
            RoomCommand::SubmitAnswer {
                player_id,
                question_index,
                value,
                time_taken_secs,
            } => {
                self.handle_submit(player_id, question_index, value, time_taken_secs);
                false
            }
            RoomCommand::EndGame { player_id } => self.handle_end_game(player_id),
            RoomCommand::Subscribe { reply } => {
                let _ = reply.send(self.hub.subscribe());
                false
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(RoomSnapshot::of(&self.session));
                false
            }
        }
    }

    fn handle_join(
        &mut self,
        player_id: Uuid,
        player_name: &str,
        conn: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    ) {
        let outcome = match self.session.join(player_id, player_name) {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = reply.send(Err(err.into()));
                return;
            }
        };

        self.dispose_at = None;
        self.connections.insert(player_id, conn.clone());
        self.send_direct(
            &conn,
            &ServerFrame::RoomJoined {
                room_id: self.room_id.clone(),
                player_id,
                is_host: outcome.is_host,
                roster: self.roster_summaries(),
            },
        );
        // A rejoiner mid-game gets the open question straight away.
        if let Some((question_index, question, deadline, _)) = self.current_delivery() {
            self.send_direct(
                &conn,
                &ServerFrame::QuestionDelivered {
                    question_index,
                    question,
                    deadline,
                },
            );
        }
        let _ = reply.send(Ok(()));

        self.broadcast(&ServerFrame::RosterUpdated {
            roster: self.roster_summaries(),
        });
        info!(
            room_id = %self.room_id,
            player = player_name,
            rejoined = outcome.rejoined,
            "player joined"
        );
    }

    fn handle_disconnected(&mut self, player_id: Uuid) {
        self.connections.remove(&player_id);
        match self.session.mark_disconnected(player_id) {
            Ok(new_host) => {
                if let Some(host_id) = new_host {
                    self.broadcast(&ServerFrame::HostChanged { player_id: host_id });
                }
                self.broadcast(&ServerFrame::RosterUpdated {
                    roster: self.roster_summaries(),
                });
                info!(room_id = %self.room_id, %player_id, "player disconnected");
            }
            Err(err) => {
                debug!(room_id = %self.room_id, error = %err, "disconnect for unknown player");
            }
        }
        if self.session.connected_count() == 0 {
            self.dispose_at = Some(Instant::now() + self.deps.settings.rejoin_grace);
        }
    }

    fn handle_start(&mut self, player_id: Uuid, criteria: GenerationCriteria) {
        if let Err(err) = self.session.begin_starting(player_id) {
            self.send_error_to(player_id, &err.into());
            return;
        }

        info!(room_id = %self.room_id, "sourcing questions");
        let source = self.deps.source.clone();
        let count = self.deps.settings.question_count;
        let task_criteria = criteria.clone();
        self.pending_criteria = Some(criteria);
        self.generation = Some(tokio::spawn(async move {
            source.obtain(&task_criteria, count).await
        }));
    }

    fn handle_sourced(&mut self, result: Result<SourcingResult, JoinError>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => return,
            Err(err) => {
                error!(room_id = %self.room_id, error = %err, "question sourcing task panicked");
                self.fail_start("question sourcing failed");
                return;
            }
        };

        match outcome {
            Ok((set, source)) => {
                let criteria = self.pending_criteria.take().unwrap_or_default();
                let metadata = SessionMetadata {
                    source,
                    criteria,
                    question_count: set.len(),
                };
                match self.session.activate(set.as_ref().clone(), metadata) {
                    Ok(()) => self.announce_started(),
                    Err(err) => {
                        // The host ended the game while questions were being
                        // sourced; nothing to announce.
                        debug!(room_id = %self.room_id, error = %err, "discarding sourced questions");
                    }
                }
            }
            Err(err) => {
                warn!(room_id = %self.room_id, error = %err, "question sourcing failed");
                self.fail_start(&err.to_string());
            }
        }
    }

    fn announce_started(&mut self) {
        let frame = match (self.session.metadata(), self.current_delivery()) {
            (Some(metadata), Some((question_index, question, deadline, _))) => {
                ServerFrame::GameStarted {
                    session: SessionSummary::new(&self.session, metadata),
                    question_index,
                    question,
                    deadline,
                }
            }
            _ => return,
        };
        self.broadcast(&frame);
        self.arm_question_timer();
        info!(
            room_id = %self.room_id,
            questions = self.session.question_count(),
            "game started"
        );
    }

    fn fail_start(&mut self, reason: &str) {
        self.pending_criteria = None;
        match self.session.fail_starting() {
            Ok(()) => {
                self.broadcast(&ServerFrame::StartGameError {
                    reason: reason.to_string(),
                });
                // No questions were ever shown; return straight to the lobby.
                self.session = self.session.successor();
                if self.session.connected_count() == 0 {
                    self.dispose_at = Some(Instant::now() + self.deps.settings.rejoin_grace);
                }
            }
            Err(err) => {
                debug!(room_id = %self.room_id, error = %err, "start failure in unexpected phase");
            }
        }
    }

    fn handle_deadline(&mut self) {
        let report = match self.session.expire_current() {
            Ok(report) => report,
            Err(err) => {
                debug!(room_id = %self.room_id, error = %err, "stale deadline fired");
                return;
            }
        };

        let fun_fact = self
            .session
            .question(report.closed_index)
            .and_then(|question| question.fun_fact.clone());
        self.broadcast(&ServerFrame::QuestionClosed {
            question_index: report.closed_index as u32,
            correct_answer: report.correct_choice,
            fun_fact,
        });

        match report.outcome {
            ExpiryOutcome::Advanced { .. } => {
                if let Some((question_index, question, deadline, _)) = self.current_delivery() {
                    self.broadcast(&ServerFrame::QuestionDelivered {
                        question_index,
                        question,
                        deadline,
                    });
                }
                self.arm_question_timer();
            }
            ExpiryOutcome::Finished => self.conclude(EndReason::Completed),
        }
    }

    fn handle_submit(
        &mut self,
        player_id: Uuid,
        question_index: u32,
        value: u32,
        time_taken_secs: f64,
    ) {
        match self
            .session
            .submit_answer(player_id, question_index as usize, value, time_taken_secs)
        {
            Ok(outcome) => {
                self.send_to_player(
                    player_id,
                    &ServerFrame::AnswerResult {
                        question_index: outcome.index as u32,
                        correct: outcome.correct,
                        points_earned: outcome.points,
                        correct_answer: outcome.correct_choice,
                        new_total_score: outcome.total_score,
                        streak: outcome.streak,
                    },
                );
            }
            Err(err) => self.send_error_to(player_id, &err.into()),
        }
    }

    /// Returns `true` when the host closed an unplayed lobby and the room
    /// should be disposed immediately.
    fn handle_end_game(&mut self, player_id: Uuid) -> bool {
        let was_lobby = self.session.phase() == SessionPhase::Lobby;
        if let Err(err) = self.session.end_requested_by(player_id) {
            self.send_error_to(player_id, &err.into());
            return false;
        }

        if let Some(generation) = self.generation.take() {
            generation.abort();
            self.pending_criteria = None;
        }

        if was_lobby {
            self.broadcast(&ServerFrame::GameEnded {
                reason: EndReason::HostEnded,
                final_scores: self.session.standings(),
                leaderboard_delta: None,
            });
            info!(room_id = %self.room_id, "host closed the room from the lobby");
            return true;
        }

        self.conclude(EndReason::HostEnded);
        false
    }

    /// After the results grace: reset for another round if anyone stayed,
    /// otherwise dispose.
    fn handle_grace_elapsed(&mut self) -> bool {
        if self.session.phase() == SessionPhase::Ended && self.session.connected_count() > 0 {
            self.session = self.session.successor();
            self.broadcast(&ServerFrame::RosterUpdated {
                roster: self.roster_summaries(),
            });
            info!(room_id = %self.room_id, "room reset to lobby");
            return false;
        }
        info!(room_id = %self.room_id, "disposing idle room");
        true
    }

    fn conclude(&mut self, reason: EndReason) {
        self.deadline = None;
        let delta = self.session.leaderboard_delta();
        self.broadcast(&ServerFrame::GameEnded {
            reason,
            final_scores: self.session.standings(),
            leaderboard_delta: delta.clone(),
        });
        if let Some(delta) = delta {
            let store = self.deps.leaderboard.clone();
            let room_id = self.room_id.clone();
            tokio::spawn(async move {
                if let Err(err) = store.merge(delta).await {
                    warn!(room_id, error = %err, "leaderboard merge failed");
                }
            });
        }
        self.dispose_at = Some(Instant::now() + self.deps.settings.results_grace);
        info!(room_id = %self.room_id, reason = ?reason, "game ended");
    }

    /// The open question as a deliverable frame body, plus its window length.
    fn current_delivery(&self) -> Option<(u32, QuestionView, String, u32)> {
        let (index, question) = self.session.current_question()?;
        let deadline = self.session.deadline()?;
        Some((
            index as u32,
            QuestionView::from(question),
            format_timestamp(deadline),
            question.time_limit_secs,
        ))
    }

    fn arm_question_timer(&mut self) {
        if let Some((_, _, _, limit)) = self.current_delivery() {
            self.deadline = Some(Instant::now() + Duration::from_secs(u64::from(limit)));
        }
    }

    fn roster_summaries(&self) -> Vec<PlayerSummary> {
        self.session
            .roster()
            .values()
            .map(PlayerSummary::from)
            .collect()
    }

    /// Fan a frame out to every connected player and every SSE subscriber.
    fn broadcast(&self, frame: &ServerFrame) {
        match RoomEvent::from_frame(frame) {
            Ok(event) => {
                for conn in self.connections.values() {
                    let _ = conn.send(Message::Text(event.data.clone().into()));
                }
                self.hub.broadcast(event);
            }
            Err(err) => {
                warn!(
                    room_id = %self.room_id,
                    frame = frame.name(),
                    error = %err,
                    "failed to serialize frame"
                );
            }
        }
    }

    fn send_to_player(&self, player_id: Uuid, frame: &ServerFrame) {
        if let Some(conn) = self.connections.get(&player_id) {
            self.send_direct(conn, frame);
        }
    }

    fn send_direct(&self, conn: &mpsc::UnboundedSender<Message>, frame: &ServerFrame) {
        match serde_json::to_string(frame) {
            Ok(payload) => {
                let _ = conn.send(Message::Text(payload.into()));
            }
            Err(err) => {
                warn!(
                    room_id = %self.room_id,
                    frame = frame.name(),
                    error = %err,
                    "failed to serialize frame"
                );
            }
        }
    }

    fn send_error_to(&self, player_id: Uuid, err: &ServiceError) {
        self.send_to_player(
            player_id,
            &ServerFrame::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        );
    }
}
