/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Cross-game leaderboard seam.
pub mod leaderboard;
/// Per-room actor owning the game session and its clock.
pub mod room_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
