//! Client core for agent chat frontends.
//!
//! Everything between the chat input and the remote agent service lives here:
//! attachment normalisation, outgoing message filtering and composition, the
//! streaming session that reconciles server state with optimistic local
//! updates, and the layered thread-title engine.

pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

pub use models::{AttachmentBlock, AttachmentKind, FileInput, Message, MessageContent, Thread};
pub use repositories::{AgentService, HttpAgentService, ServiceError};
pub use services::{MessageComposer, MessageFilter, StreamSession, TitleEngine};
pub use settings::models::ClientConfig;
