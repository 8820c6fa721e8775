//! HTTP boundary for drumsep-web
//!
//! - `ui`: status page with upload form and flash messages
//! - `upload`: multipart upload (form redirect and JSON variants)
//! - `health`: liveness and diagnostics
//! - `flash`: one-shot messages carried from an upload to the next page view

pub mod flash;
pub mod health;
pub mod ui;
pub mod upload;

pub use health::health_routes;
pub use ui::ui_routes;
pub use upload::upload_routes;
