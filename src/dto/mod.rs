//! Wire types shared by the WebSocket, SSE and HTTP surfaces.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod events;
pub mod health;
pub mod rooms;
pub mod validation;
pub mod ws;

pub(crate) fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
