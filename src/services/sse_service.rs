use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::events::RoomEvent, error::ServiceError, services::room_service::RoomCommand,
    state::SharedState,
};

/// Subscribe to a live room's event stream.
pub async fn subscribe(
    state: &SharedState,
    room_id: &str,
) -> Result<broadcast::Receiver<RoomEvent>, ServiceError> {
    let missing = || ServiceError::NotFound(format!("room `{room_id}` not found"));
    let room = state.rooms().get(room_id).ok_or_else(missing)?;
    let (reply, receiver) = oneshot::channel();
    room.send(RoomCommand::Subscribe { reply })
        .map_err(|_| missing())?;
    receiver.await.map_err(|_| missing())
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<RoomEvent>,
    room_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let event = Event::default().event(payload.event).data(payload.data);
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(room_id, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
