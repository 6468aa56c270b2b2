//! HTTP API handlers for plate-gen
//!
//! REST endpoints for starting, inspecting and cancelling section image
//! generation, plus the SSE progress stream.

pub mod generation;
pub mod health;
pub mod images;
pub mod progress;

pub use generation::generation_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use progress::progress_routes;
