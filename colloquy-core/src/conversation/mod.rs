//! Conversation Context Management
//!
//! Bounded per-conversation context windows and the session registry
//! that keys them by conversation id.
//!
//! # Example
//!
//! ```rust,ignore
//! use colloquy_core::conversation::ContextBuffer;
//!
//! let mut buffer = ContextBuffer::with_preamble(6, "You are helpful.");
//! let prompt = buffer.build_prompt("Hello!")?;
//! // ... run inference on `prompt` ...
//! buffer.add_user_message("Hello!");
//! buffer.add_assistant_message("Hi there!");
//! ```

mod buffer;
mod registry;

pub use buffer::{ContextBuffer, Exchange};
pub use registry::{Session, SessionRegistry};
