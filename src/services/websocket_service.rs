use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::events::ServerFrame,
    dto::ws::ClientFrame,
    services::room_service::RoomCommand,
    state::{SharedState, rooms::RoomHandle},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual player WebSocket connection.
///
/// The first frame must be `join-room`; everything after it is routed to the
/// joined room's actor. The socket never touches game state directly.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let join = match ClientFrame::from_json_str(&initial_message) {
        Ok(ClientFrame::JoinRoom(join)) => join,
        Ok(_) => {
            warn!("first frame was not join-room");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate join frame");
            send_frame(
                &outbound_tx,
                &ServerFrame::Error {
                    code: "malformed-frame".to_string(),
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = join.player_id.unwrap_or_else(Uuid::new_v4);
    let room = state.rooms().open(&join.room_id);
    let (reply, accepted) = oneshot::channel();
    let command = RoomCommand::Join {
        player_id,
        player_name: join.player_name.clone(),
        conn: outbound_tx.clone(),
        reply,
    };
    let joined = match room.send(command) {
        Ok(()) => accepted.await,
        Err(_) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            send_frame(
                &outbound_tx,
                &ServerFrame::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(_) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    }

    info!(room_id = %room.room_id(), %player_id, "player socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientFrame::from_json_str(&text) {
                Ok(frame) => {
                    if handle_frame(&room, player_id, frame, &outbound_tx).is_err() {
                        info!(room_id = %room.room_id(), %player_id, "room gone, closing socket");
                        break;
                    }
                }
                Err(err) => {
                    warn!(room_id = %room.room_id(), %player_id, error = %err, "rejected inbound frame");
                    send_frame(
                        &outbound_tx,
                        &ServerFrame::Error {
                            code: "malformed-frame".to_string(),
                            message: err.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room_id = %room.room_id(), %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    let _ = room.send(RoomCommand::Disconnected { player_id });
    info!(room_id = %room.room_id(), %player_id, "player socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one validated frame to the joined room.
///
/// `Err` means the room actor is gone and the socket should close.
fn handle_frame(
    room: &RoomHandle,
    player_id: Uuid,
    frame: ClientFrame,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ()> {
    if frame.room_id() != room.room_id() {
        send_frame(
            outbound_tx,
            &ServerFrame::Error {
                code: "wrong-room".to_string(),
                message: format!(
                    "this connection is joined to `{}`, not `{}`",
                    room.room_id(),
                    frame.room_id()
                ),
            },
        );
        return Ok(());
    }

    let command = match frame {
        ClientFrame::JoinRoom(_) => {
            warn!(room_id = %room.room_id(), %player_id, "ignoring duplicate join frame");
            return Ok(());
        }
        ClientFrame::StartGame(start) => RoomCommand::StartGame {
            player_id,
            criteria: start.criteria(),
        },
        ClientFrame::SubmitAnswer(answer) => RoomCommand::SubmitAnswer {
            player_id,
            question_index: answer.question_index,
            value: answer.value,
            time_taken_secs: answer.time_taken_seconds,
        },
        ClientFrame::EndGame(end) => {
            if let Some(reason) = end.reason.as_deref() {
                info!(room_id = %room.room_id(), %player_id, reason, "client asked to end the game");
            }
            RoomCommand::EndGame { player_id }
        }
    };
    room.send(command).map_err(|_| ())
}

/// Serialize a frame and push it onto the connection's writer channel.
fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &ServerFrame) {
    match serde_json::to_string(frame) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(frame = frame.name(), error = %err, "failed to serialize frame");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
