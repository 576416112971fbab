//! Core primitives shared across the proxy: SSE decoding and the
//! diagram edit algorithm.

pub mod patch;
pub mod sse;

pub use patch::{DiagramEdit, EditOutcome, apply_edits};
pub use sse::{SseDecoder, SseFrame};
