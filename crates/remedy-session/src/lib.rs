//! Remedy Session
//!
//! Managed sessions for external code-generation CLI tools. A session is one
//! logical multi-turn conversation that may span several OS processes:
//!
//! - [`ProfileRegistry`] describes how each tool is called
//! - [`SessionManager`] spawns, streams, continues and stops processes
//! - [`SessionStore`] persists finished sessions for later inspection
//! - [`SessionGenerationProvider`] exposes a tool as a [`remedy_core::GenerationProvider`]

pub mod buffer;
pub mod error;
pub mod manager;
pub mod model;
pub mod profile;
pub mod provider;
pub mod store;

pub use buffer::{OutputBuffer, OutputChunk, Stream};
pub use error::{Result, SessionError};
pub use manager::{SessionManager, StartRequest};
pub use model::{Role, SessionEvent, SessionRecord, SessionStatus, Turn};
pub use profile::{Invocation, ProfileRegistry, PromptDelivery, ToolProfile};
pub use provider::SessionGenerationProvider;
pub use store::{FsSessionStore, MemorySessionStore, SessionStore};
