//! 内容脚本
//!
//! ```text
//! MessageClient (UI) ──request──▶ MessageListener ──▶ FieldFillEngine ──▶ Document
//!        ◀──────────── exactly one response ─────────────┘
//! ```

pub mod channel;
pub mod engine;
pub mod field_control;
pub mod protocol;

pub use channel::{channel, serve, spawn_content_script, Envelope, MessageClient, MessageListener, Responder};
pub use engine::{FieldFillEngine, FillStats};
pub use field_control::{ApplyOutcome, FieldControl};
pub use protocol::{DecodedRequest, FieldAssignment, FillRequest, FillResponse, NO_FORM_FOUND, UNKNOWN_ACTION};
