//! Chat message model, context assembly and the diagram system prompt.

pub mod context;
pub mod prompt;
pub mod types;

pub use context::augment;
pub use types::{ChatEvent, ChatMessage, ChatProxyRequest, MessagePart};
