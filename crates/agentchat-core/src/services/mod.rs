pub mod content_normalizer;
pub mod csv;
pub mod message_composer;
pub mod message_filter;
pub mod stream_session;
pub mod title_cache;
pub mod title_generator;
pub mod title_rules;
pub mod tool_responses;

pub use content_normalizer::{AttachmentError, StageReport, build_attachment, encode_file, is_duplicate, stage_files};
pub use csv::parse_csv;
pub use message_composer::{ComposeRejection, ComposedTurn, MessageComposer};
pub use message_filter::{FilterMetadata, FilterReason, FilteredMessage, MessageFilter};
pub use stream_session::{SessionError, SessionStatus, StreamSession};
pub use title_cache::{ContentHash, TitleCache};
pub use title_generator::TitleEngine;
pub use tool_responses::ensure_tool_calls_have_responses;
